use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "genflow", version, about = "Media generation task runner")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a single generation to a terminal state
    Generate(GenerateArgs),
    /// Print the resolved configuration as TOML
    Config,
}

#[derive(Debug, clap::Args)]
pub struct GenerateArgs {
    /// Prompt to generate from
    #[arg(long)]
    pub prompt: String,

    /// Media type: image, video or audio
    #[arg(long, default_value = "image")]
    pub media: String,

    /// Model identifier understood by the provider
    #[arg(long, default_value = "ideogram-v2")]
    pub model: String,

    /// Reference media the provider may condition on
    #[arg(long)]
    pub reference_url: Option<String>,

    /// Use the built-in mock provider instead of the configured gateway
    #[arg(long)]
    pub mock: bool,

    /// Disable the progress bar (useful when piping output)
    #[arg(long)]
    pub quiet: bool,

    // Image knobs
    #[arg(long)]
    pub aspect_ratio: Option<String>,
    #[arg(long)]
    pub style: Option<String>,

    // Video / audio knobs
    #[arg(long)]
    pub duration_secs: Option<u32>,
    #[arg(long)]
    pub resolution: Option<String>,
    #[arg(long)]
    pub voice: Option<String>,
}
