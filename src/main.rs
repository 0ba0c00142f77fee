use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use reqwest::{Method, Url};
use std::path::PathBuf;
use std::sync::Arc;

use offline_reader_lib::asset_cache::{AssetRequest, CacheStorage, HttpFetcher, OfflineWorker};
use offline_reader_lib::{
    ConsoleNotifier, FontSize, ImportFile, Library, LogNotifier, Notifier, ReaderConfig,
};

/// 未设置 RUST_LOG 时的日志过滤
const DEFAULT_LOG_FILTER: &str = "info,offline_reader_lib=debug";

#[derive(Parser)]
#[command(name = "offline-reader", about = "本地 TXT 书籍阅读器")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// 以离线状态运行
    #[arg(long)]
    offline: bool,
    /// 提示只写入日志，不输出到终端
    #[arg(short, long)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 导入目录中的 .txt 文件为一本书
    Import { dir: PathBuf },
    /// 列出全部书籍
    List,
    /// 列出书籍的章节
    Chapters { book: i64 },
    /// 阅读章节
    Read {
        book: i64,
        chapter: u32,
        #[arg(long)]
        font_size: Option<u32>,
    },
    /// 修改书名
    Rename { book: i64, title: String },
    /// 离线保存书籍
    Save { book: i64 },
    /// 列出已保存的书籍
    Saved,
    /// 移除离线保存（需要口令）
    Unsave {
        book: i64,
        #[arg(long)]
        password: String,
    },
    /// 删除书籍（需要口令）
    Delete {
        book: i64,
        #[arg(long)]
        password: String,
    },
    /// 离线资源缓存
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Subcommand)]
enum CacheAction {
    /// 预缓存清单中的资源
    Install,
    /// 清除旧版本缓存
    Activate,
    /// 以缓存优先方式请求资源
    Fetch {
        url: String,
        #[arg(long, default_value = "GET")]
        method: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ReaderConfig::load_or_default(cli.config.as_deref())
        .context("加载配置失败")?;

    match cli.command {
        Command::Cache { action } => run_cache(&config, action).await,
        command => run_library(&config, cli.offline, notifier(cli.quiet), command),
    }
}

fn notifier(quiet: bool) -> Arc<dyn Notifier> {
    if quiet {
        Arc::new(LogNotifier)
    } else {
        Arc::new(ConsoleNotifier)
    }
}

fn run_library(
    config: &ReaderConfig,
    offline: bool,
    notifier: Arc<dyn Notifier>,
    command: Command,
) -> anyhow::Result<()> {
    let mut library = Library::open(config, notifier);
    library.session_mut().set_offline(offline);

    match command {
        Command::Import { dir } => {
            let files = ImportFile::collect_dir(&dir)
                .with_context(|| format!("读取目录失败: {}", dir.display()))?;
            let report = library.import_directory(files)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::List => {
            for book in library.books() {
                let mark = if library.is_saved(book.id) { "*" } else { " " };
                println!(
                    "{} {}  {}  作者: {}  类型: {}  ({} 章)",
                    mark,
                    book.id,
                    book.title,
                    book.author,
                    book.genre,
                    book.chapters.len()
                );
            }
        }
        Command::Chapters { book } => {
            let book = library
                .book(book)
                .ok_or_else(|| anyhow!("找不到书籍: {}", book))?;
            for chapter in &book.chapters {
                println!("{:>4}  {}", chapter.id, chapter.title);
            }
        }
        Command::Read {
            book,
            chapter,
            font_size,
        } => {
            if let Some(px) = font_size {
                library.session_mut().set_font_size(FontSize::new(px));
            }
            let px = library.session().font_size().px();
            let chapter = library.open_chapter(book, chapter)?;
            println!("{}  [{}px]\n", chapter.title, px);
            println!("{}", chapter.content);
        }
        Command::Rename { book, title } => library.rename_book(book, &title)?,
        Command::Save { book } => {
            library.save_book(book)?;
        }
        Command::Saved => {
            for book in library.saved_books() {
                println!("{}  {}", book.id, book.title);
            }
        }
        Command::Unsave { book, password } => library.remove_saved_book(book, &password)?,
        Command::Delete { book, password } => library.delete_book(book, &password)?,
        Command::Cache { action } => return Err(anyhow!("不支持的命令: {:?}", action)),
    }

    Ok(())
}

async fn run_cache(config: &ReaderConfig, action: CacheAction) -> anyhow::Result<()> {
    let storage = Arc::new(
        CacheStorage::open(&config.storage.database_path).context("打开缓存数据库失败")?,
    );
    let origin = Url::parse(&config.cache.origin).context("origin 无效")?;
    let fetcher = Arc::new(HttpFetcher::new(origin));
    let worker = OfflineWorker::new(&config.cache, storage, fetcher)?;

    match action {
        CacheAction::Install => {
            let count = worker.install().await?;
            println!("已预缓存 {} 个资源到 {}", count, worker.cache_name());
        }
        CacheAction::Activate => {
            for name in worker.activate()? {
                println!("已删除旧缓存 {}", name);
            }
        }
        CacheAction::Fetch { url, method } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .map_err(|e| anyhow!("无效的请求方法: {}", e))?;
            let request = AssetRequest::new(method, worker.resolve(&url)?);
            let response = worker.handle_fetch(request).await?;
            println!("{} {}", response.status, response.url);
            for (name, value) in &response.headers {
                println!("{}: {}", name, value);
            }
            println!("\n{}", String::from_utf8_lossy(&response.body));
        }
    }

    Ok(())
}
