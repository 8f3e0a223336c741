//! pagewright command-line interface.
//!
//! Manages pages and their blocks in a local database. Every command prints
//! its result as JSON on stdout; logs go to stderr (`RUST_LOG` to tune).
//!
//! Usage:
//!   pagewright page create --site <SITE> --title "About us" --slug about
//!   pagewright block add <PAGE> hero
//!   pagewright block add <PAGE> text --content '{"title": "Intro"}'
//!   pagewright block move <BLOCK> up
//!   pagewright reorder <PAGE> <BLOCK>...
//!   pagewright page reorder --site <SITE> <PAGE>...
//!
//!   # Scratch database, gone when the command exits
//!   pagewright --memory page list

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use pagewright_client::{ClientError, LocalBackend, PageEditor};
use pagewright_kernel::{Kernel, KernelConfig, KernelError};
use pagewright_types::{BlockId, BlockKind, Identity, NewPage, PageId, PagePatch, SiteId};

/// Block-based page composition.
#[derive(Parser, Debug)]
#[command(name = "pagewright")]
#[command(about = "Compose pages from ordered, typed content blocks")]
struct Args {
    /// RON config file (default: <config_dir>/pagewright/config.ron)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Use a throwaway in-memory database
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Page lifecycle
    #[command(subcommand)]
    Page(PageCommand),

    /// Blocks of a page
    #[command(subcommand)]
    Block(BlockCommand),

    /// Commit a full new order for a page's blocks
    Reorder {
        page: PageId,
        /// Every block of the page, top to bottom
        #[arg(required = true)]
        blocks: Vec<BlockId>,
    },
}

#[derive(Subcommand, Debug)]
enum PageCommand {
    /// Create a draft page
    Create {
        #[arg(long)]
        site: SiteId,
        #[arg(long)]
        title: String,
        #[arg(long)]
        slug: String,
        #[command(flatten)]
        meta: PageMeta,
    },
    /// Show one page
    Get { page: PageId },
    /// List pages
    List {
        #[arg(long)]
        site: Option<SiteId>,
    },
    /// Change page metadata
    Update {
        page: PageId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        slug: Option<String>,
        #[command(flatten)]
        meta: PageMeta,
    },
    /// Delete a page and all its blocks
    Delete { page: PageId },
    /// Publish a page
    Publish { page: PageId },
    /// Return a page to draft
    Unpublish { page: PageId },
    /// Copy a page and its blocks into a new draft
    Duplicate { page: PageId },
    /// Commit a full navigation order for a site's pages
    Reorder {
        #[arg(long)]
        site: SiteId,
        /// Every page of the site, top to bottom
        #[arg(required = true)]
        pages: Vec<PageId>,
    },
}

#[derive(clap::Args, Debug, Default)]
struct PageMeta {
    #[arg(long)]
    meta_description: Option<String>,
    #[arg(long)]
    h1: Option<String>,
    /// Render the H1 inside the hero block
    #[arg(long)]
    h1_in_hero: Option<bool>,
    #[arg(long)]
    canonical_url: Option<String>,
    /// Raw HTML for <head>
    #[arg(long)]
    head_html: Option<String>,
    /// Newline-separated keywords
    #[arg(long)]
    keywords: Option<String>,
    /// Newline-separated LSI phrases
    #[arg(long)]
    lsi_phrases: Option<String>,
    #[arg(long)]
    nav_order: Option<i64>,
}

#[derive(Subcommand, Debug)]
enum BlockCommand {
    /// List a page's blocks in render order
    List { page: PageId },
    /// Show one block
    Get { block: BlockId },
    /// Append a block (default content unless --content is given)
    Add {
        page: PageId,
        /// hero, text, image, gallery, slider
        kind: String,
        /// Content JSON; omitted fields take the kind's defaults
        #[arg(long)]
        content: Option<String>,
    },
    /// Replace a block's content
    Update {
        block: BlockId,
        #[arg(long)]
        content: String,
    },
    /// Remove a block; later blocks move up
    Remove { block: BlockId },
    /// Move a block within its page
    Move {
        block: BlockId,
        #[command(subcommand)]
        to: MoveTarget,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum MoveTarget {
    /// One slot towards the top
    Up,
    /// One slot towards the bottom
    Down,
    /// To a zero-based position
    To { position: usize },
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn load_config(args: &Args) -> Result<KernelConfig> {
    let mut config = match &args.config {
        Some(path) => KernelConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => match KernelConfig::default_path() {
            Some(path) => KernelConfig::load_or_default(&path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => KernelConfig::default(),
        },
    };
    if let Some(db) = &args.db {
        config.db_path = Some(db.clone());
    }
    if args.memory {
        config.in_memory = true;
    }
    tracing::debug!(?config, "configuration resolved");
    Ok(config)
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_kind(kind: &str) -> Result<BlockKind> {
    BlockKind::from_str(kind).ok_or_else(|| {
        let known: Vec<_> = BlockKind::ALL.iter().map(|k| k.as_str()).collect();
        anyhow!("unknown block kind `{kind}` (expected one of: {})", known.join(", "))
    })
}

fn parse_content(text: &str) -> Result<Value> {
    serde_json::from_str(text).context("--content is not valid JSON")
}

impl PageMeta {
    fn apply_to_new(self, page: &mut NewPage) {
        if let Some(meta) = self.meta_description {
            page.meta_description = meta;
        }
        if let Some(h1) = self.h1 {
            page.h1_tag = h1;
        }
        if let Some(in_hero) = self.h1_in_hero {
            page.use_h1_in_hero = in_hero;
        }
        if let Some(url) = self.canonical_url {
            page.canonical_url = url;
        }
        if let Some(html) = self.head_html {
            page.custom_head_html = html;
        }
        if let Some(keywords) = self.keywords {
            page.keywords = keywords;
        }
        if let Some(phrases) = self.lsi_phrases {
            page.lsi_phrases = phrases;
        }
        if let Some(nav_order) = self.nav_order {
            page.nav_order = nav_order;
        }
    }
}

async fn run(kernel: Arc<Kernel>, command: Command) -> Result<()> {
    let identity = Identity::system();
    let scoped = kernel.scoped(identity.clone());

    match command {
        Command::Page(cmd) => match cmd {
            PageCommand::Create {
                site,
                title,
                slug,
                meta,
            } => {
                let mut new = NewPage::new(site, title, slug);
                meta.apply_to_new(&mut new);
                print(&scoped.create_page(new)?)
            }
            PageCommand::Get { page } => print(&scoped.get_page(page)?),
            PageCommand::List { site } => print(&scoped.list_pages(site)?),
            PageCommand::Update {
                page,
                title,
                slug,
                meta,
            } => {
                let patch = PagePatch {
                    title,
                    slug,
                    meta_description: meta.meta_description,
                    h1_tag: meta.h1,
                    use_h1_in_hero: meta.h1_in_hero,
                    canonical_url: meta.canonical_url,
                    custom_head_html: meta.head_html,
                    keywords: meta.keywords,
                    lsi_phrases: meta.lsi_phrases,
                    nav_order: meta.nav_order,
                };
                print(&scoped.update_page(page, patch)?)
            }
            PageCommand::Delete { page } => print(&scoped.delete_page(page)?),
            PageCommand::Publish { page } => print(&scoped.publish(page)?),
            PageCommand::Unpublish { page } => print(&scoped.unpublish(page)?),
            PageCommand::Duplicate { page } => print(&scoped.duplicate(page)?),
            PageCommand::Reorder { site, pages } => {
                print(&scoped.reorder_pages(site, &pages)?)
            }
        },

        Command::Block(cmd) => match cmd {
            BlockCommand::List { page } => print(&scoped.list_blocks(page)?),
            BlockCommand::Get { block } => print(&scoped.get_block(block)?),
            BlockCommand::Add {
                page,
                kind,
                content,
            } => {
                let kind = parse_kind(&kind)?;
                let block = match content {
                    Some(text) => scoped.append_block(page, kind, &parse_content(&text)?)?,
                    None => scoped.append_default_block(page, kind)?,
                };
                print(&block)
            }
            BlockCommand::Update { block, content } => {
                print(&scoped.update_block_content(block, &parse_content(&content)?)?)
            }
            BlockCommand::Remove { block } => print(&scoped.remove_block(block)?),
            BlockCommand::Move { block, to } => {
                let page = scoped.get_block(block)?.page_id;
                let backend = LocalBackend::new(kernel.clone(), identity);
                let mut editor = PageEditor::new(Arc::new(backend));
                editor.open(page).await?;
                match to {
                    MoveTarget::Up => editor.move_up(block).await?,
                    MoveTarget::Down => editor.move_down(block).await?,
                    MoveTarget::To { position } => editor.move_to(block, position).await?,
                }
                print(&editor.blocks())
            }
        },

        Command::Reorder { page, blocks } => print(&scoped.reorder(page, &blocks)?),
    }
}

/// Hint printed after a failure, if one applies.
fn hint(err: &anyhow::Error) -> Option<&'static str> {
    let kernel_err = err.downcast_ref::<KernelError>().or_else(|| {
        match err.downcast_ref::<ClientError>() {
            Some(ClientError::Rejected(e)) => Some(e),
            _ => None,
        }
    })?;
    match kernel_err {
        KernelError::NotFound { .. } => Some("run `pagewright page list` to see existing pages"),
        KernelError::Conflict(_) => {
            Some("the page changed; run `pagewright block list <PAGE>` and retry")
        }
        KernelError::PageConflict(_) => {
            Some("the site changed; run `pagewright page list --site <SITE>` and retry")
        }
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = load_config(&args)?;
    let kernel = Arc::new(Kernel::open(&config).context("opening page database")?);

    let result = run(kernel, args.command).await;
    if let Err(err) = &result {
        if let Some(hint) = hint(err) {
            eprintln!("hint: {hint}");
        }
    }
    result
}
