use clap::Parser;
use docent_context::text::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, TextChunker};
use std::fs;
use std::io::{self, Read};

/// A CLI tool to chunk a text document into JSON output using docent-context.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Source identifier recorded on every chunk. Defaults to the input path.
    #[arg(short, long)]
    source: Option<String>,

    /// Window length in characters.
    #[arg(short = 'c', long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by consecutive windows.
    #[arg(short = 'o', long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let (file_content, default_source) = if let Some(input_path) = &args.input {
        (fs::read_to_string(input_path)?, input_path.clone())
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        (buffer, "stdin".to_string())
    };
    let source = args.source.unwrap_or(default_source);

    let chunker = TextChunker::new(args.chunk_size, args.chunk_overlap);
    let chunks = chunker.get_chunks(&source, &file_content);

    let json_output = serde_json::to_string_pretty(&chunks)?;
    println!("{}", json_output);

    Ok(())
}
