mod catalog;
mod cli;
mod climatology;
mod dataset;
mod folders;
mod reading;
mod regrid;
mod stats;
mod store;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(command::default_data_dir);

    match &cli.command {
        Commands::Download {
            case,
            clear,
            one_variant_per_model,
        } => match command::download(&data_dir, *case, *clear, *one_variant_per_model).await {
            Ok(folder) => println!("Raw ensemble saved to `{}`", folder),
            Err(e) => eprintln!("Error: {:#}", e),
        },
        Commands::Climatology { case } => match command::climatology(&data_dir, *case) {
            Ok(folder) => println!("Climatology store saved to `{}`", folder),
            Err(e) => eprintln!("Error: {:#}", e),
        },
        Commands::Regrid { case } => match command::regrid(&data_dir, *case) {
            Ok(folder) => println!("Regridded store saved to `{}`", folder),
            Err(e) => eprintln!("Error: {:#}", e),
        },
        Commands::Table { output } => match command::table(&data_dir, output.clone()) {
            Ok(file) => println!("Summary table saved to `{}`", file),
            Err(e) => eprintln!("Error: {:#}", e),
        },
    }

    Ok(())
}
