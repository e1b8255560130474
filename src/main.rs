use anyhow::Context;
use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;

use trade_journal_lib::analytics::{
    CalendarMonth, CalendarView, CategoryFilter, OutcomeFilter, StatisticsReport, TradeFilters,
};
use trade_journal_lib::api::{Coin, CoinGeckoClient};
use trade_journal_lib::commands;
use trade_journal_lib::models::Category;
use trade_journal_lib::sync::{PriceSnapshot, PriceTicker};
use trade_journal_lib::{default_data_dir, open_journal, Database};

/// Trading journal analytics from the command line.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the journal database (defaults to $TRADE_JOURNAL_DATA_DIR or ./data).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the statistics report.
    Report {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// List trades, newest first.
    Trades {
        /// Grade to keep ("all", "A+", "B+", "C+", "D+", "F").
        #[arg(long, default_value = "all")]
        category: CategoryFilter,
        /// Outcome to keep ("all", "win", "loss").
        #[arg(long, default_value = "all")]
        outcome: OutcomeFilter,
    },
    /// Show the P&L calendar for one month.
    Calendar {
        /// Year (defaults to the current one).
        #[arg(long, value_parser = clap::value_parser!(i32).range(1..=9999))]
        year: Option<i32>,
        /// Month, 1-12 (defaults to the current one).
        #[arg(long, value_parser = clap::value_parser!(i32).range(1..=12))]
        month: Option<i32>,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Write a JSON backup of trades and checklist items.
    Export { path: PathBuf },
    /// Replace the journal with a JSON backup.
    Import { path: PathBuf },
    /// Write trades as CSV (screenshots are left out).
    ExportCsv { path: PathBuf },
    /// Manage checklist items.
    Checklist {
        #[command(subcommand)]
        action: ChecklistAction,
    },
    /// Stream BTC, ETH and SOL prices until interrupted.
    Prices {
        /// Fetch once and exit.
        #[arg(long)]
        once: bool,
    },
}

#[derive(Subcommand)]
enum ChecklistAction {
    /// List checklist items in order.
    List,
    /// Append a checklist item.
    Add { label: String },
    /// Remove a checklist item.
    Remove { label: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let db = open_journal(&data_dir)
        .with_context(|| format!("Failed to open journal in {:?}", data_dir))?;

    match cli.command {
        Commands::Report { json } => {
            let report = commands::get_statistics_report(&db)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Commands::Trades { category, outcome } => {
            let trades = commands::get_trades(&db, Some(TradeFilters { category, outcome }))?;
            println!("{}", serde_json::to_string_pretty(&trades)?);
        }
        Commands::Calendar { year, month, json } => {
            let today = Local::now();
            let year = year.unwrap_or(today.year());
            let month = month.unwrap_or(today.month() as i32);
            let month = CalendarMonth::new(year, month - 1)
                .with_context(|| format!("No calendar month for {}-{}", year, month))?;
            let view = commands::get_calendar_month(&db, Some(month))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_calendar(&view);
            }
        }
        Commands::Export { path } => {
            let json = commands::export_all_data(&db)?;
            fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
            println!("Backup written to {:?}", path);
        }
        Commands::Import { path } => {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let summary = commands::import_all_data(&db, &json)?;
            println!(
                "Imported {} trades{}",
                summary.trades_imported,
                if summary.checklist_replaced { " and checklist items" } else { "" }
            );
        }
        Commands::ExportCsv { path } => {
            let file = File::create(&path).with_context(|| format!("Failed to create {:?}", path))?;
            let rows = commands::export_trades_csv(&db, BufWriter::new(file))?;
            println!("Wrote {} trades to {:?}", rows, path);
        }
        Commands::Checklist { action } => {
            let items = match action {
                ChecklistAction::List => commands::get_checklist_items(&db)?,
                ChecklistAction::Add { label } => commands::add_checklist_item(&db, &label)?,
                ChecklistAction::Remove { label } => commands::remove_checklist_item(&db, &label)?,
            };
            for (i, item) in items.iter().enumerate() {
                println!("{:>2}. {}", i + 1, item);
            }
        }
        Commands::Prices { once } => run_prices(&db, once).await?,
    }

    Ok(())
}

async fn run_prices(db: &Database, once: bool) -> anyhow::Result<()> {
    let settings = commands::get_settings(db)?;
    if !settings.price_feed_enabled {
        println!("Price feed is disabled in settings");
        return Ok(());
    }

    let source = Arc::new(CoinGeckoClient::new(&settings.currency));
    let ticker = PriceTicker::from_settings(source, &settings);

    if once {
        ticker.refresh().await?;
        print_prices(&ticker.snapshot().await, &settings.currency);
        return Ok(());
    }

    ticker.start().await;
    let mut display = tokio::time::interval(ticker.interval());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = display.tick() => print_prices(&ticker.snapshot().await, &settings.currency),
        }
    }
    ticker.stop().await;

    Ok(())
}

fn print_prices(snapshot: &PriceSnapshot, currency: &str) {
    let line: Vec<String> = Coin::ALL
        .iter()
        .map(|coin| match snapshot.price(*coin) {
            Some(price) => format!("{} {:.2}", coin, price),
            None => format!("{} --", coin),
        })
        .collect();
    println!("{}  ({})", line.join("  "), currency);
}

fn print_report(report: &StatisticsReport) {
    println!("Trades:        {}", report.total);
    println!("Wins / losses: {} / {}", report.wins, report.losses);
    println!("Win rate:      {:.1}%", report.win_rate);
    println!("Today:         {}", report.today_trades);
    println!("Avg per day:   {:.1}", report.avg_per_day);
    match report.streak_type {
        Some(outcome) => println!("Streak:        {} {}", report.current_streak, outcome.as_str()),
        None => println!("Streak:        -"),
    }

    println!();
    println!("By grade:");
    for category in Category::ALL {
        let stats = report.category(category);
        println!("  {:<3} {:>4} trades  {:>5.1}%", category, stats.total, stats.rate);
    }

    println!();
    println!("By hour:");
    for (hour, stats) in report.hourly_stats.iter().enumerate() {
        if stats.total > 0 {
            println!("  {:02}:00 {:>4} trades  {:>5.1}%", hour, stats.total, stats.rate);
        }
    }

    println!();
    println!("Checklist:");
    for (label, stats) in &report.checklist_correlation {
        println!("  {:>4} trades  {:>5.1}%  {}", stats.total, stats.rate, label);
    }
}

fn print_calendar(view: &CalendarView) {
    println!("{}", view.label);
    println!("{:>9}{:>9}{:>9}{:>9}{:>9}{:>9}{:>9}", "Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat");
    for week in &view.weeks {
        let days: String = week
            .iter()
            .map(|cell| match cell {
                Some(cell) => format!("{:>9}", cell.day),
                None => format!("{:>9}", ""),
            })
            .collect();
        let pnl: String = week
            .iter()
            .map(|cell| match cell.and_then(|c| c.aggregate) {
                Some(day) => format!("{:>8.1}%", day.total_pnl),
                None => format!("{:>9}", ""),
            })
            .collect();
        println!("{}", days);
        println!("{}", pnl);
    }
    println!("Month: {:.1}% over {} trades", view.total_pnl, view.trade_count);
}
