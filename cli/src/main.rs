use clap::Parser;
use lessonkit_cli::Cli;

fn main() {
    let cli = Cli::parse();
    lessonkit_cli::init_tracing();
    std::process::exit(run(cli));
}

#[tokio::main(flavor = "current_thread")]
async fn run(cli: Cli) -> i32 {
    cli.run().await
}
