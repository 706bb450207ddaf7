use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sturdy_webdriver::{
    ChromeDriver, ConnectionMode, Engine, EngineConfig, Locator, Session,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a Chrome/Chromium binary
    #[arg(long)]
    chrome_path: Option<String>,

    /// Pass --no-sandbox to Chrome (Linux AppArmor workaround)
    #[arg(long)]
    no_sandbox: bool,

    /// Run without a visible window
    #[arg(long)]
    headless: bool,

    /// Attach to a running Chrome on this debug port instead of launching
    #[arg(long)]
    debug_port: Option<u16>,

    /// Where failure artifacts are written
    #[arg(long, default_value = "debug")]
    debug_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a page and print its title
    Title { url: String },

    /// Deliver text into an element, reporting the strategy that worked
    Deliver {
        url: String,
        /// CSS selector of the target control
        selector: String,
        text: String,
        /// Bounded-wait budget for locating the element, in seconds
        #[arg(long, default_value_t = 8)]
        timeout_secs: u64,
    },

    /// Click a trigger, handle the resulting dialog, print the page's result
    Dialog {
        url: String,
        /// CSS selector of the element that opens the dialog
        trigger: String,
        /// Prompt reply to stage before accepting
        #[arg(long)]
        input: Option<String>,
        /// Cancel the dialog instead of confirming it
        #[arg(long)]
        dismiss: bool,
        /// CSS selector of the element showing the dialog's outcome
        #[arg(long, default_value = "#result")]
        result_selector: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let driver = match cli.debug_port {
        Some(port) => ChromeDriver::connect_debug_port(port).await?,
        None => {
            ChromeDriver::new(ConnectionMode::Launched {
                chrome_path: cli.chrome_path.clone(),
                no_sandbox: cli.no_sandbox,
                headless: cli.headless,
            })
            .await?
        }
    };

    let outcome = run(&driver, &cli).await;

    // The session is released on success and failure alike.
    if let Err(e) = driver.close().await {
        log::warn!("Failed to close browser: {}", e);
    }

    if let Err(e) = &outcome {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    outcome
}

async fn run(driver: &ChromeDriver, cli: &Cli) -> anyhow::Result<()> {
    let mut config = EngineConfig {
        debug_dir: cli.debug_dir.clone(),
        ..EngineConfig::default()
    };
    if let Command::Deliver { timeout_secs, .. } = &cli.command {
        config.locate_timeout = Duration::from_secs(*timeout_secs);
    }
    let engine = Engine::new(config)?;

    match &cli.command {
        Command::Title { url } => {
            driver.navigate(url).await?;
            println!("{}", driver.title().await?);
        }
        Command::Deliver {
            url,
            selector,
            text,
            ..
        } => {
            driver.navigate(url).await?;
            let strategy = engine
                .deliver_text(driver, &Locator::css(selector.clone()), text)
                .await?;
            println!("delivered via {}", strategy.name());
        }
        Command::Dialog {
            url,
            trigger,
            input,
            dismiss,
            result_selector,
        } => {
            driver.navigate(url).await?;

            let located = engine
                .locate(driver, &Locator::css(trigger.clone()))
                .await?;
            // The click only completes once the dialog it opens is handled,
            // so don't wait for it.
            let _ =
                tokio::time::timeout(Duration::from_secs(2), located.control.click()).await;
            driver.enter_top_context().await?;

            let mut modal = engine.await_modal(driver, Duration::from_secs(10)).await?;
            println!("dialog says: {}", modal.text());
            if *dismiss {
                modal.dismiss().await?;
            } else {
                if let Some(reply) = input {
                    modal.enter_text(reply.clone());
                }
                modal.accept().await?;
            }

            match driver.element_text(&Locator::css(result_selector.clone())).await {
                Ok(result) => println!("page result: {}", result),
                Err(_) => println!("no result element on page"),
            }
        }
    }
    Ok(())
}
