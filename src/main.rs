use clap::{Parser, Subcommand};
use folio::assemble::{self, PandocRenderer, Renderer};
use folio::discover::{self, StageEvent};
use folio::{config, naming, output};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Turn a tree of Markdown chapters into one print-ready book")]
#[command(long_about = "\
Turn a tree of Markdown chapters into one print-ready book

Groups of chapters are declared in book.toml, in reading order. Each group
folder is walked for chapter files, which are normalized for print and
staged as numbered copies, then handed to pandoc.

Book structure:

  my-book/
  ├── book.toml                    # Groups, metadata, render settings
  ├── images/                      # Referenced from any chapter depth
  ├── Part I - Fundamentals/
  │   ├── Chapter 1.md
  │   ├── Chapter 2.md
  │   └── Chapter 10.md            # Natural order: after Chapter 2
  └── Appendices/
      └── AppendixA.md             # Appendix groups go last

Normalization (code fences are left alone except for wrapping):
  Frontmatter removed, decorative --- lines replaced, <img> tags converted,
  image paths made root-relative, links to other chapters turned into bold
  text, chapter headings promoted, long code lines hard-wrapped.

Run 'folio gen-config' to generate a documented book.toml.")]
#[command(version = env!("FOLIO_VERSION"))]
struct Cli {
    /// Book root directory
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file, relative to the book root unless absolute
    #[arg(long, default_value = "book.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the document order without writing anything
    Check,
    /// Normalize and stage the chapters into a directory
    Stage {
        /// Staging directory
        #[arg(long)]
        out: PathBuf,
    },
    /// Stage into a temporary directory and render the book
    Build,
    /// Print a stock book.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Check => {
            let book = load_book(&cli)?;
            println!("==> Checking {}", cli.root.display());
            let (tx, printer) = spawn_printer(&cli.root);
            let groups = discover::discover(&cli.root, &book, Some(&tx))?;
            drop(tx);
            printer.join().ok();
            let entries = discover::plan(
                &groups,
                book.discovery.appendix_placement,
                book.discovery.index_width,
            );
            let width = naming::index_width(entries.len(), book.discovery.index_width);
            println!();
            output::print_plan(&entries, width, &cli.root);
            println!("==> Book is valid");
        }
        Command::Stage { out } => {
            let book = load_book(&cli)?;
            println!("==> Staging {} → {}", cli.root.display(), out.display());
            let (tx, printer) = spawn_printer(&cli.root);
            let result = discover::stage(&cli.root, &book, out, Some(tx));
            printer.join().ok();
            let staged = result?;
            assemble::assemble(&cli.root, out, &staged, &book)?;
            println!("==> Staged {} files in {}", staged.len(), out.display());
        }
        Command::Build => {
            let book = load_book(&cli)?;
            let renderer = PandocRenderer::from_config(&book.render)?;
            let workspace = tempfile::Builder::new().prefix("folio-").tempdir()?;

            println!("==> Stage 1: Staging {}", cli.root.display());
            let (tx, printer) = spawn_printer(&cli.root);
            let result = discover::stage(&cli.root, &book, workspace.path(), Some(tx));
            printer.join().ok();
            let staged = result?;

            println!("==> Stage 2: Rendering with {}", renderer.pandoc.display());
            let job = assemble::assemble(&cli.root, workspace.path(), &staged, &book)?;
            renderer.render(&job)?;

            println!("==> Build complete: {}", job.output.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load the book config and size the worker pool from it.
fn load_book(cli: &Cli) -> Result<config::BookConfig, config::ConfigError> {
    let path = if cli.config.is_absolute() {
        cli.config.clone()
    } else {
        cli.root.join(&cli.config)
    };
    let book = config::load_config(&path)?;
    init_thread_pool(&book.processing);
    Ok(book)
}

/// Print staging events on a separate thread as they arrive.
fn spawn_printer(root: &Path) -> (Sender<StageEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<StageEvent>();
    let root = root.to_path_buf();
    let printer = std::thread::spawn(move || {
        for event in rx {
            output::print_stage_event(&event, &root);
        }
    });
    (tx, printer)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
