mod upload;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "filedrop", version)]
#[command(about = "Upload files to a filedrop server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file and print its link
    Upload(upload::UploadArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Upload(args) => upload::run(args),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", console::style("error:").red().bold(), e);
        std::process::exit(1);
    }
}
