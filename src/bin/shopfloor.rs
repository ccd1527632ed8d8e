//! shopfloor CLI — operator interface to the shop coordination core.

use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use shopfloor_rs::config::Config;
use shopfloor_rs::db::Db;
use shopfloor_rs::model::{
    CommissionState, NewTicket, ReportId, Role, TicketId, TicketStatus, WorkerId,
};
use shopfloor_rs::policy::CommissionPolicy;
use shopfloor_rs::telemetry::{TelemetryConfig, init_telemetry};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "shopfloor", about = "Auto-repair-shop coordination core")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Service ticket operations
    Ticket {
        #[command(subcommand)]
        action: TicketAction,
    },
    /// Worker surface: claimable list, claim, complete
    Work {
        #[command(subcommand)]
        action: WorkAction,
    },
    /// Quality control gate
    Quality {
        #[command(subcommand)]
        action: QualityAction,
    },
    /// Commission records
    Commission {
        #[command(subcommand)]
        action: CommissionAction,
    },
    /// Watch change events (ticket_changed / assignment_changed)
    Listen,
}

#[derive(Subcommand)]
enum TicketAction {
    /// Create a ticket with its task list
    Create {
        /// Vehicle UUID
        vehicle: Uuid,
        /// Customer UUID
        customer: Uuid,
        /// Quoted total, minor currency units
        total: i64,
        /// Task lines as role:labor:description (repeatable)
        #[arg(long = "task")]
        tasks: Vec<String>,
        /// Promised completion date (RFC 3339)
        #[arg(long)]
        estimated: Option<chrono::DateTime<chrono::Utc>>,
    },
    /// List tickets
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
        /// Maximum tickets to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show a ticket with its ledger and reports
    Show {
        /// Ticket ID (full UUID or prefix)
        id: String,
    },
    /// Administrative cancel
    Cancel {
        /// Ticket UUID
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum WorkAction {
    /// List tickets this worker may claim
    Claimable {
        /// Worker UUID
        worker: Uuid,
        /// Worker role (validated)
        role: String,
        /// Maximum tickets to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Claim a ticket for one role
    Claim {
        /// Ticket UUID
        service: Uuid,
        /// Worker UUID
        worker: Uuid,
        /// Worker role
        role: String,
    },
    /// Submit completion of this worker's portion
    Complete {
        /// Ticket UUID
        service: Uuid,
        /// Worker UUID
        worker: Uuid,
        /// Worker role
        role: String,
        /// Evidence was attached in the media store
        #[arg(long)]
        evidence: bool,
        /// Free-text completion notes
        #[arg(long)]
        notes: Option<String>,
    },
}

#[derive(Subcommand)]
enum QualityAction {
    /// Mark the start of an inspection (informational)
    Start {
        /// Ticket UUID
        service: Uuid,
        /// Reviewing worker UUID
        worker: Uuid,
    },
    /// File a quality report against a completed ticket
    Submit {
        /// Ticket UUID
        service: Uuid,
        /// Reviewing worker UUID
        worker: Uuid,
        /// Findings description
        description: String,
        /// Checklist passed
        #[arg(long)]
        passed: bool,
        /// 1-5 rating
        #[arg(long, default_value_t = 5)]
        rating: i16,
        /// Defect found (repeatable)
        #[arg(long = "defect")]
        defects: Vec<String>,
        /// Media store reference (repeatable)
        #[arg(long = "media")]
        media: Vec<String>,
    },
    /// Approve a pending report
    Approve {
        /// Report UUID
        report: Uuid,
        /// Resolving worker UUID
        resolver: Uuid,
        /// Approval comments
        #[arg(long)]
        comments: Option<String>,
    },
    /// Reject a pending report and send the work back
    Reject {
        /// Report UUID
        report: Uuid,
        /// Resolving worker UUID
        resolver: Uuid,
        /// Rejection comments (required)
        comments: String,
    },
    /// List a ticket's reports
    Reports {
        /// Ticket UUID
        service: Uuid,
    },
}

#[derive(Subcommand)]
enum CommissionAction {
    /// List commission records
    List {
        /// Filter by worker UUID
        #[arg(long)]
        worker: Option<Uuid>,
        /// Filter by state (pending | paid)
        #[arg(long)]
        state: Option<String>,
        /// Maximum records to show
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "shopfloor".to_string(),
    })?;

    let policy = CommissionPolicy::load(config.commission_policy_path.as_deref())?;
    let db = Db::connect(config.database_url.expose_secret())
        .await?
        .with_policy(policy);
    db.migrate().await?;

    match cli.command {
        Command::Ticket { action } => match action {
            TicketAction::Create {
                vehicle,
                customer,
                total,
                tasks,
                estimated,
            } => cmd_ticket_create(&db, vehicle, customer, total, tasks, estimated).await,
            TicketAction::List { status, limit } => cmd_ticket_list(&db, status, limit).await,
            TicketAction::Show { id } => cmd_ticket_show(&db, id).await,
            TicketAction::Cancel { id } => {
                let ticket = db.cancel_ticket(TicketId(id)).await?;
                println!("Cancelled: {} (#{})", ticket.id, ticket.track_no);
                Ok(())
            }
        },
        Command::Work { action } => match action {
            WorkAction::Claimable {
                worker,
                role,
                limit,
            } => {
                // The role is identity-provider input; reject unknown
                // strings before touching the store.
                let _: Role = role.parse()?;
                let tickets = db.list_claimable(WorkerId(worker), limit).await?;
                print_ticket_table(&tickets);
                Ok(())
            }
            WorkAction::Claim {
                service,
                worker,
                role,
            } => {
                let role: Role = role.parse()?;
                let a = db.claim(TicketId(service), WorkerId(worker), role).await?;
                println!("Claimed: {} as {} (assignment {})", a.service_id, a.role, a.id);
                Ok(())
            }
            WorkAction::Complete {
                service,
                worker,
                role,
                evidence,
                notes,
            } => {
                let role: Role = role.parse()?;
                let a = db
                    .complete(
                        TicketId(service),
                        WorkerId(worker),
                        role,
                        evidence,
                        notes.as_deref(),
                    )
                    .await?;
                println!("Completed: {} as {} (assignment {})", a.service_id, a.role, a.id);
                Ok(())
            }
        },
        Command::Quality { action } => match action {
            QualityAction::Start { service, worker } => {
                db.start_review(TicketId(service), WorkerId(worker)).await?;
                println!("Review started on {service}");
                Ok(())
            }
            QualityAction::Submit {
                service,
                worker,
                description,
                passed,
                rating,
                defects,
                media,
            } => {
                let report = db
                    .submit_evidence(
                        TicketId(service),
                        WorkerId(worker),
                        &description,
                        passed,
                        rating,
                        &defects,
                        &media,
                    )
                    .await?;
                println!("Report filed: {} (state: {})", report.id, report.state);
                Ok(())
            }
            QualityAction::Approve {
                report,
                resolver,
                comments,
            } => {
                db.approve(ReportId(report), WorkerId(resolver), comments.as_deref())
                    .await?;
                println!("Approved: {report}");
                Ok(())
            }
            QualityAction::Reject {
                report,
                resolver,
                comments,
            } => {
                db.reject(ReportId(report), WorkerId(resolver), &comments)
                    .await?;
                println!("Rejected: {report} — work reopened");
                Ok(())
            }
            QualityAction::Reports { service } => {
                let reports = db.list_reports(TicketId(service)).await?;
                if reports.is_empty() {
                    println!("No reports for {service}.");
                    return Ok(());
                }
                for r in &reports {
                    println!(
                        "{}  {}  rating {}  passed {}  {}",
                        r.id, r.state, r.rating, r.checklist_passed, r.description
                    );
                }
                Ok(())
            }
        },
        Command::Commission { action } => match action {
            CommissionAction::List {
                worker,
                state,
                limit,
            } => {
                let state: Option<CommissionState> = match state {
                    Some(s) => Some(s.parse()?),
                    None => None,
                };
                let records = db
                    .list_commissions(worker.map(WorkerId), state, limit)
                    .await?;
                if records.is_empty() {
                    println!("No commission records found.");
                    return Ok(());
                }
                println!(
                    "{:<10}  {:<10}  {:<10}  {:<12}  {:>10}  {:<8}",
                    "ID", "WORKER", "SERVICE", "ROLE", "AMOUNT", "STATE"
                );
                println!("{}", "-".repeat(70));
                for c in &records {
                    println!(
                        "{:<10}  {:<10}  {:<10}  {:<12}  {:>10}  {:<8}",
                        c.id.to_string(),
                        c.worker_id.to_string(),
                        c.service_id.to_string(),
                        c.role.to_string(),
                        c.amount,
                        c.state.to_string()
                    );
                }
                println!("\n{} record(s)", records.len());
                Ok(())
            }
        },
        Command::Listen => cmd_listen(&db).await,
    }
}

async fn cmd_ticket_create(
    db: &Db,
    vehicle: Uuid,
    customer: Uuid,
    total: i64,
    tasks: Vec<String>,
    estimated: Option<chrono::DateTime<chrono::Utc>>,
) -> anyhow::Result<()> {
    let mut new = NewTicket::new(vehicle, customer, total);
    if let Some(when) = estimated {
        new = new.estimated(when);
    }
    for spec in &tasks {
        let (role, labor, description) = parse_task_spec(spec)?;
        new = new.task(role, description, labor);
    }

    let ticket = db.create_ticket(new).await?;
    println!(
        "Created: {} (#{}) status {}",
        ticket.id, ticket.track_no, ticket.status
    );
    Ok(())
}

/// Parse a role:labor:description task line.
fn parse_task_spec(spec: &str) -> anyhow::Result<(Role, i64, String)> {
    let mut parts = spec.splitn(3, ':');
    let (Some(role), Some(labor), Some(description)) =
        (parts.next(), parts.next(), parts.next())
    else {
        anyhow::bail!("bad task spec '{spec}', expected role:labor:description");
    };
    Ok((role.parse()?, labor.parse()?, description.to_string()))
}

async fn cmd_ticket_list(db: &Db, status: Option<String>, limit: i64) -> anyhow::Result<()> {
    let status_filter: Option<TicketStatus> = match status {
        Some(s) => Some(s.parse()?),
        None => None,
    };

    let tickets = db.list_tickets(status_filter, limit).await?;
    if tickets.is_empty() {
        println!("No tickets found.");
        return Ok(());
    }
    print_ticket_table(&tickets);
    Ok(())
}

fn print_ticket_table(tickets: &[shopfloor_rs::model::ServiceTicket]) {
    println!(
        "{:<10}  {:>6}  {:<12}  {:>12}  CREATED",
        "ID", "NO", "STATUS", "TOTAL"
    );
    println!("{}", "-".repeat(60));
    for t in tickets {
        println!(
            "{:<10}  {:>6}  {:<12}  {:>12}  {}",
            t.id.to_string(),
            t.track_no,
            t.status.to_string(),
            t.total,
            t.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    println!("\n{} ticket(s)", tickets.len());
}

async fn cmd_ticket_show(db: &Db, id_str: String) -> anyhow::Result<()> {
    // Support prefix matching — find the ticket whose ID starts with the
    // given string.
    let id = if id_str.len() < 36 {
        let tickets = db.list_tickets(None, 100).await?;
        let matches: Vec<_> = tickets
            .iter()
            .filter(|t| t.id.0.to_string().starts_with(&id_str))
            .collect();
        match matches.len() {
            0 => anyhow::bail!("no ticket matching prefix '{id_str}'"),
            1 => matches[0].id,
            n => anyhow::bail!("{n} tickets match prefix '{id_str}' — be more specific"),
        }
    } else {
        TicketId(Uuid::parse_str(&id_str)?)
    };

    let ticket = db.get_ticket(id).await?;
    let tasks = db.get_ticket_tasks(id).await?;
    let ledger = db.list_assignments(id).await?;
    let reports = db.list_reports(id).await?;
    let commissions = db.list_ticket_commissions(id).await?;

    println!("ID:         {}", ticket.id);
    println!("Number:     #{}", ticket.track_no);
    println!("Status:     {}", ticket.status);
    println!("Vehicle:    {}", ticket.vehicle_id);
    println!("Customer:   {}", ticket.customer_id);
    println!("Total:      {}", ticket.total);
    println!("Created:    {}", ticket.created_at);
    println!("Updated:    {}", ticket.updated_at);
    if let Some(est) = ticket.estimated_completion {
        println!("Estimated:  {est}");
    }
    if let Some(done) = ticket.completed_at {
        println!("Completed:  {done}");
    }

    if !tasks.is_empty() {
        println!("---");
        for task in &tasks {
            println!("Task:       {}  {}  labor {}", task.role, task.description, task.labor);
        }
    }

    if !ledger.is_empty() {
        println!("---");
        for a in &ledger {
            let finished = a
                .finished_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "Ledger:     {}  {}  {}  started {}  finished {}",
                a.worker_id,
                a.role,
                a.state,
                a.started_at.format("%Y-%m-%d %H:%M"),
                finished
            );
        }
    }

    if !reports.is_empty() {
        println!("---");
        for r in &reports {
            println!("Report:     {}  {}  rating {}", r.id, r.state, r.rating);
        }
    }

    if !commissions.is_empty() {
        println!("---");
        for c in &commissions {
            println!(
                "Commission: {}  {}  {}  amount {}",
                c.id, c.worker_id, c.role, c.amount
            );
        }
    }

    Ok(())
}

/// Subscribe to the change channels and print events until ctrl-c.
/// Stand-in for the UI's cache-revalidation consumer.
async fn cmd_listen(db: &Db) -> anyhow::Result<()> {
    use shopfloor_rs::event::{ASSIGNMENT_CHANNEL, TICKET_CHANNEL};

    let mut listener = sqlx::postgres::PgListener::connect_with(db.pool()).await?;
    listener.listen(TICKET_CHANNEL).await?;
    listener.listen(ASSIGNMENT_CHANNEL).await?;

    println!("listening on {TICKET_CHANNEL} + {ASSIGNMENT_CHANNEL} (ctrl-c to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nstopped");
                return Ok(());
            }
            notif = listener.recv() => {
                let notif = notif?;
                println!("[{}] {}", notif.channel(), notif.payload());
            }
        }
    }
}
