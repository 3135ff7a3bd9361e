use analytics::{fetch_view, generate_period_report, load_dashboard, Dashboard, Period, PeriodReport};
use anyhow::{Context, Result};
use common::store::LedgerStore;
use common::types::{LedgerEntry, Session};
use rust_decimal::Decimal;
use std::fmt::Write as _;

use crate::catalog::{filter_projects, ProjectFilter};
use crate::service::{parse_amount, WalletService};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Balance,
    History,
    Deposit { amount: Decimal },
    Withdraw { amount: Decimal },
    Invest { amount: Decimal, project: String },
    Dashboard,
    Projects { search: Option<String> },
    Report { year: i32, quarter: Option<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub config_path: Option<String>,
    pub command: Command,
}

fn amount_arg(arg: Option<String>, usage: &str) -> std::result::Result<Decimal, String> {
    let raw = arg.ok_or_else(|| usage.to_string())?;
    parse_amount(&raw).map_err(|e| e.to_string())
}

pub fn parse_args<I>(mut args: I) -> std::result::Result<Invocation, String>
where
    I: Iterator<Item = String>,
{
    // Drop argv[0].
    let _ = args.next();

    let mut config_path = None;
    let mut next = args.next();
    if next.as_deref() == Some("--config") {
        config_path = Some(
            args.next()
                .ok_or_else(|| "usage: wallet --config <path> [command]".to_string())?,
        );
        next = args.next();
    }

    let Some(cmd) = next else {
        return Ok(Invocation {
            config_path,
            command: Command::Serve,
        });
    };

    let command = match cmd.as_str() {
        "serve" => Command::Serve,
        "balance" => Command::Balance,
        "history" => Command::History,
        "deposit" => Command::Deposit {
            amount: amount_arg(args.next(), "usage: wallet deposit <amount>")?,
        },
        "withdraw" => Command::Withdraw {
            amount: amount_arg(args.next(), "usage: wallet withdraw <amount>")?,
        },
        "invest" => {
            let usage = "usage: wallet invest <amount> <project...>";
            let amount = amount_arg(args.next(), usage)?;
            let project = args.collect::<Vec<_>>().join(" ");
            if project.trim().is_empty() {
                return Err(usage.to_string());
            }
            Command::Invest { amount, project }
        }
        "dashboard" => Command::Dashboard,
        "projects" => {
            let search = args.collect::<Vec<_>>().join(" ");
            Command::Projects {
                search: (!search.is_empty()).then_some(search),
            }
        }
        "report" => {
            let usage = "usage: wallet report <year> [quarter]";
            let year = args
                .next()
                .and_then(|y| y.parse().ok())
                .ok_or_else(|| usage.to_string())?;
            let quarter = match args.next() {
                Some(q) => Some(
                    q.trim_start_matches(|c: char| c.eq_ignore_ascii_case(&'q'))
                        .parse()
                        .map_err(|_bad_quarter| usage.to_string())?,
                ),
                None => None,
            };
            Command::Report { year, quarter }
        }
        other => return Err(format!("unknown command: {other}")),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}

pub async fn run_command<S: LedgerStore>(
    service: &WalletService<S>,
    session: &Session,
    cmd: Command,
) -> Result<()> {
    match cmd {
        Command::Serve => Ok(()),
        Command::Balance => {
            let wallet = service.load_wallet(session).await?;
            println!("Balance: {} USDQ", wallet.balance);
            Ok(())
        }
        Command::History => {
            let wallet = service.load_wallet(session).await?;
            let entries = service.ledger(session, &wallet.id).await?;
            println!("Transactions ({}):", entries.len());
            for entry in &entries {
                println!("{}", format_entry(entry));
            }
            Ok(())
        }
        Command::Deposit { amount } => {
            let wallet = service.load_wallet(session).await?;
            let receipt = service.deposit(session, &wallet, amount).await?;
            println!("Deposited {amount} USDQ. Balance: {}", receipt.balance);
            Ok(())
        }
        Command::Withdraw { amount } => {
            let wallet = service.load_wallet(session).await?;
            let receipt = service.withdraw(session, &wallet, amount).await?;
            println!("Withdrew {amount} USDQ. Balance: {}", receipt.balance);
            Ok(())
        }
        Command::Invest { amount, project } => {
            let wallet = service.load_wallet(session).await?;
            let receipt = service.invest(session, &wallet, amount, &project).await?;
            println!(
                "Invested {amount} USDQ in {}. Balance: {}",
                project.trim(),
                receipt.balance
            );
            Ok(())
        }
        Command::Dashboard => {
            service.load_wallet(session).await?;
            let dashboard = load_dashboard(service.store(), session, chrono::Utc::now())
                .await
                .context("failed to load dashboard")?;
            print!("{}", render_dashboard(&dashboard));
            Ok(())
        }
        Command::Projects { search } => {
            let filter = ProjectFilter {
                search,
                ..Default::default()
            };
            println!("Projects:");
            for p in filter_projects(&filter) {
                println!(
                    "{:>2}  {:<24} {:<14} {:>6}  risk={:<10} min={:<5} lock={}",
                    p.id, p.name, p.category, p.apy, p.risk, p.min_investment, p.lock_period
                );
            }
            Ok(())
        }
        Command::Report { year, quarter } => {
            let period = match quarter {
                Some(q) => Period::quarterly(year, q)?,
                None => Period::annual(year),
            };
            let view = fetch_view(service.store(), session)
                .await
                .context("failed to load ledger")?;
            let report = generate_period_report(&view.entries, period)?;
            print!("{}", render_report(&report));
            Ok(())
        }
    }
}

fn format_entry(entry: &LedgerEntry) -> String {
    let label = match entry.investment_project() {
        Some(project) => format!("invest -> {project}"),
        None => entry.entry_type.to_string(),
    };
    format!(
        "{}  {:<28} {:>12}  {}",
        entry.created_at.format("%Y-%m-%d %H:%M"),
        label,
        entry.signed_amount(),
        entry.status
    )
}

pub fn render_dashboard(dashboard: &Dashboard) -> String {
    let mut out = String::new();
    let e = &dashboard.earnings;
    let _ = writeln!(out, "Current balance:    {}", e.current_balance);
    let _ = writeln!(out, "Initial investment: {}", e.initial_investment);
    let _ = writeln!(
        out,
        "Total earnings:     {} ({}%)",
        e.total_earnings,
        e.earnings_percent.round_dp(2)
    );

    let _ = writeln!(out, "Performance:");
    for p in &dashboard.performance {
        let _ = writeln!(out, "  {} {}  {}", p.label, p.year, p.balance);
    }

    let _ = writeln!(out, "Allocation:");
    for slice in &dashboard.allocation {
        let _ = writeln!(out, "  {:<24} {:>3}%", slice.label, slice.percent);
    }

    let _ = writeln!(out, "Investments:");
    for inv in &dashboard.investments {
        let _ = writeln!(
            out,
            "  {:<24} invested={} value={} roi={}",
            inv.project, inv.invested, inv.current_value, inv.roi_label
        );
    }
    out
}

pub fn render_report(report: &PeriodReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Report {} ({} .. {})",
        report.period,
        report.start.format("%Y-%m-%d"),
        report.end.format("%Y-%m-%d")
    );
    let _ = writeln!(out, "Deposits:    {}", report.total_deposits);
    let _ = writeln!(out, "Withdrawals: {}", report.total_withdrawals);
    let _ = writeln!(out, "Invested:    {}", report.total_invested);
    let _ = writeln!(out, "Net flow:    {}", report.net_flow);
    for flow in &report.by_project {
        let _ = writeln!(out, "  {:<24} {}", flow.project, flow.invested);
    }
    let _ = writeln!(out, "Entries: {}", report.entry_count);
    for entry in &report.entries {
        let _ = writeln!(out, "  {}", format_entry(entry));
    }
    out
}
