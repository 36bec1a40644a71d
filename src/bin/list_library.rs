use clap::Parser;
use jukebox::{Config, Library};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "list_library")]
#[command(about = "Print the libraries and songs the jukebox would see")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let mut library_config = config.library.clone();
    library_config.watch = false;
    let library = Library::open(&library_config);

    println!("Music library: {}", library.base_path().display());
    println!("Extensions:    {}", library_config.extensions().join(", "));
    println!();

    if library.is_empty() {
        println!("No libraries found");
        return Ok(());
    }

    for (index, songs) in library.libraries().iter().enumerate() {
        let key = if index < 9 {
            format!("[{}]", index + 1)
        } else {
            "[-]".to_string()
        };
        println!("{} {} ({} songs)", key, songs.name(), songs.len());

        for song in &songs.songs {
            let name = song
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("      {}", name);
        }
    }

    if library.libraries().len() > 9 {
        println!();
        println!("Libraries past the ninth have no key of their own.");
    }

    Ok(())
}
