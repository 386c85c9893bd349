use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `FormRestyler` - restyle public Google Forms through a Gemini chat loop.
#[derive(Parser, Debug)]
#[command(name = "formrestyler")]
#[command(author = "theonlyhennygod")]
#[command(version = "0.1.0")]
#[command(about = "Restyle Google Forms into self-contained HTML pages.", long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP gateway (editor API, published forms, submission proxy)
    Serve {
        /// Port to listen on (use 0 for random available port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Extract the structure of a public Google Form and print it as JSON
    Scrape {
        /// Public form URL (docs.google.com/forms/...)
        url: String,
    },

    /// Run one regeneration turn against a scraped structure
    Generate {
        /// JSON file produced by `scrape`
        #[arg(short, long)]
        structure: PathBuf,

        /// Styling instruction for the model
        #[arg(short = 'm', long)]
        prompt: String,

        /// HTML from a previous turn to refine
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Let the model request background/header/accent images
        #[arg(long)]
        images: bool,

        /// Write the HTML here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}
