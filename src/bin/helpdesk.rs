use clap::{Parser, Subcommand};

use helpdesk_kpi::{
    date_util, report, Category, HelpDesk, NewComment, NewTicket, NewUser, Priority, Role, Status,
    Ticket, TicketQuery, TicketUpdate, User,
};

#[derive(Parser)]
#[command(name = "helpdesk", about = "IT helpdesk tickets and KPI analytics")]
struct Cli {
    /// Database path (default: ~/.helpdesk/helpdesk.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, browse and work on tickets
    Ticket {
        #[command(subcommand)]
        action: TicketAction,
    },
    /// Manage the user directory
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Compute the KPI snapshot over every ticket
    Metrics {
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Compute as of this instant (RFC 3339 or YYYY-MM-DD; default: now)
        #[arg(long)]
        as_of: Option<String>,
        /// First day of the week for trends (overrides the week_start config)
        #[arg(long)]
        week_start: Option<String>,
    },
    /// Role-scoped ticket counts for one user
    Dashboard {
        /// User id or email (default: current_user config)
        #[arg(long = "as", value_name = "USER")]
        as_user: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum TicketAction {
    /// Open a new ticket
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Steps to reproduce the problem
        #[arg(long, default_value = "")]
        steps: String,
        /// hardware, software, network, security or other
        #[arg(long, default_value = "other")]
        category: String,
        /// low, medium, high or critical
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Assignee id or email
        #[arg(long)]
        assign: Option<String>,
        /// Attachment file name (repeatable)
        #[arg(long = "screenshot")]
        screenshots: Vec<String>,
        /// Creator id or email (default: current_user config)
        #[arg(long)]
        by: Option<String>,
    },
    /// List tickets, newest first
    List {
        /// Case-insensitive match on title, description or creator name
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        /// Assignee id or email
        #[arg(long)]
        assignee: Option<String>,
        /// Only tickets assigned to the current user
        #[arg(long)]
        mine: bool,
        /// Restrict to what this user's role can see (id or email)
        #[arg(long = "as", value_name = "USER")]
        as_user: Option<String>,
        /// Created after date (YYYY-MM-DD)
        #[arg(long)]
        created_after: Option<String>,
        /// Created before date (YYYY-MM-DD)
        #[arg(long)]
        created_before: Option<String>,
        /// Maximum results
        #[arg(long, default_value = "100")]
        limit: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Output as CSV
        #[arg(long)]
        csv: bool,
        /// Count only (no output rows)
        #[arg(long)]
        count: bool,
    },
    /// Show one ticket with its comments
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Change fields on a ticket
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        /// Assignee id or email
        #[arg(long, conflicts_with = "unassign")]
        assign: Option<String>,
        #[arg(long)]
        unassign: bool,
        /// Who made the change (default: current_user config)
        #[arg(long)]
        by: Option<String>,
    },
    /// Record resolution steps and mark the ticket resolved
    Resolve {
        id: String,
        #[arg(long)]
        steps: String,
        #[arg(long)]
        by: Option<String>,
    },
    /// Add a comment to a ticket
    Comment {
        id: String,
        content: String,
        #[arg(long)]
        by: Option<String>,
    },
    /// Load tickets from a JSON export
    Import { file: String },
    /// Write every ticket as JSON
    Export {
        /// Output file (default: stdout)
        #[arg(long, short)]
        output: Option<String>,
    },
    /// Print the support-ticket report
    Report { id: String },
}

#[derive(Subcommand)]
enum UserAction {
    /// Register a user
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// employee, tech_support, developer or it_admin
        #[arg(long, default_value = "employee")]
        role: String,
        #[arg(long)]
        department: Option<String>,
    },
    /// List users
    List {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => helpdesk_kpi::Database::open_at(path).await?,
        None => helpdesk_kpi::Database::open().await?,
    };
    let hd = HelpDesk::new(db);

    match cli.command {
        Commands::Ticket { action } => handle_ticket(&hd, action).await?,
        Commands::User { action } => handle_user(&hd, action).await?,
        Commands::Metrics {
            json,
            as_of,
            week_start,
        } => handle_metrics(&hd, json, as_of.as_deref(), week_start.as_deref()).await?,
        Commands::Dashboard { as_user, json } => {
            let user = acting_user(&hd, as_user.as_deref()).await?;
            let summary = hd.dashboard(&user).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Dashboard: {} ({})", user.name, user.role);
                println!("  Visible:        {}", summary.visible);
                println!("  Open:           {}", summary.open);
                println!("  In progress:    {}", summary.in_progress);
                println!("  Resolved:       {}", summary.resolved);
                println!("  Created by me:  {}", summary.my_tickets);
                println!("  Assigned to me: {}", summary.assigned_to_me);
            }
        }
        Commands::Config { action } => handle_config(&hd, action).await?,
        Commands::Status => print_status(&hd).await?,
    }

    Ok(())
}

/// Resolve a user id or email address against the directory.
async fn resolve_user(hd: &HelpDesk, identifier: &str) -> anyhow::Result<User> {
    if let Some(user) = hd.get_user(identifier).await? {
        return Ok(user);
    }
    hd.find_user_by_email(identifier)
        .await?
        .ok_or_else(|| anyhow::anyhow!("No user with id or email '{identifier}'"))
}

/// The explicitly named user, else the configured current user.
async fn acting_user(hd: &HelpDesk, identifier: Option<&str>) -> anyhow::Result<User> {
    match identifier {
        Some(id) => resolve_user(hd, id).await,
        None => hd.current_user().await?.ok_or_else(|| {
            anyhow::anyhow!(
                "No user given. Pass --by/--as or run: helpdesk config set current_user <EMAIL>"
            )
        }),
    }
}

async fn handle_ticket(hd: &HelpDesk, action: TicketAction) -> anyhow::Result<()> {
    match action {
        TicketAction::Create {
            title,
            description,
            steps,
            category,
            priority,
            assign,
            screenshots,
            by,
        } => {
            let creator = acting_user(hd, by.as_deref()).await?;
            let assigned_to = match assign {
                Some(a) => Some(resolve_user(hd, &a).await?.id),
                None => None,
            };
            let ticket = hd
                .create_ticket(NewTicket {
                    title,
                    description,
                    reproduction_steps: steps,
                    category: category.parse::<Category>()?,
                    priority: priority.parse::<Priority>()?,
                    created_by: creator.id,
                    assigned_to,
                    screenshots,
                })
                .await?;
            println!("Created {}", ticket.id);
        }
        TicketAction::List {
            search,
            status,
            category,
            priority,
            assignee,
            mine,
            as_user,
            created_after,
            created_before,
            limit,
            json,
            csv,
            count,
        } => {
            let mut query = TicketQuery::new().limit(limit);
            if let Some(s) = search {
                query = query.search(&s);
            }
            if let Some(s) = status {
                query = query.status(s.parse::<Status>()?);
            }
            if let Some(c) = category {
                query = query.category(c.parse::<Category>()?);
            }
            if let Some(p) = priority {
                query = query.priority(p.parse::<Priority>()?);
            }
            if mine {
                let me = acting_user(hd, None).await?;
                query = query.assigned_to(&me.id);
            } else if let Some(a) = assignee {
                let user = resolve_user(hd, &a).await?;
                query = query.assigned_to(&user.id);
            }
            if let Some(u) = as_user {
                let viewer = resolve_user(hd, &u).await?;
                query = query.visible_to(&viewer);
            }
            if let Some(d) = created_after {
                query = query.created_after(date_util::parse_instant(&d)?);
            }
            if let Some(d) = created_before {
                query = query.created_before(date_util::parse_instant(&d)?);
            }

            if count {
                println!("{}", query.count(hd.db()).await?);
            } else if json {
                println!("{}", query.to_json(hd.db()).await?);
            } else if csv {
                print!("{}", query.to_csv(hd.db()).await?);
            } else {
                let rows = query.tickets(hd.db()).await?;
                if rows.is_empty() {
                    println!("No tickets found.");
                } else {
                    for t in &rows {
                        print_ticket_line(t);
                    }
                    println!("\n{} tickets", rows.len());
                }
            }
        }
        TicketAction::Show { id, json } => {
            let ticket = hd
                .get_ticket(&id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Ticket not found: {id}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ticket)?);
            } else {
                print_ticket(&ticket);
            }
        }
        TicketAction::Update {
            id,
            title,
            description,
            status,
            category,
            priority,
            assign,
            unassign,
            by,
        } => {
            let status = status.map(|s| s.parse::<Status>()).transpose()?;
            let resolved_by = if status == Some(Status::Resolved) {
                optional_acting_user(hd, by.as_deref()).await?.map(|u| u.id)
            } else {
                None
            };
            let assigned_to = if unassign {
                Some(None)
            } else if let Some(a) = assign {
                Some(Some(resolve_user(hd, &a).await?.id))
            } else {
                None
            };
            let ticket = hd
                .update_ticket(
                    &id,
                    TicketUpdate {
                        title,
                        description,
                        category: category.map(|c| c.parse::<Category>()).transpose()?,
                        priority: priority.map(|p| p.parse::<Priority>()).transpose()?,
                        status,
                        assigned_to,
                        resolution_steps: None,
                        resolved_by,
                    },
                )
                .await?;
            print_ticket_line(&ticket);
        }
        TicketAction::Resolve { id, steps, by } => {
            let resolver = optional_acting_user(hd, by.as_deref()).await?;
            let ticket = hd
                .resolve_ticket(&id, &steps, resolver.as_ref().map(|u| u.id.as_str()))
                .await?;
            print_ticket_line(&ticket);
        }
        TicketAction::Comment { id, content, by } => {
            let author = acting_user(hd, by.as_deref()).await?;
            let comment = hd
                .add_comment(
                    &id,
                    NewComment {
                        user_id: author.id,
                        content,
                    },
                )
                .await?;
            println!("Added {} to {id}", comment.id);
        }
        TicketAction::Import { file } => {
            let data = std::fs::read_to_string(&file)?;
            let tickets: Vec<Ticket> = serde_json::from_str(&data)?;
            let n = hd.import_tickets(tickets).await?;
            println!("Imported {n} tickets from {file}");
        }
        TicketAction::Export { output } => {
            let json = hd.export_tickets().await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Exported tickets to {path}");
                }
                None => println!("{json}"),
            }
        }
        TicketAction::Report { id } => {
            let ticket = hd
                .get_ticket(&id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Ticket not found: {id}"))?;
            print!("{}", report::ticket_report(&ticket));
        }
    }
    Ok(())
}

/// Like [`acting_user`] but without an error when nobody is configured.
async fn optional_acting_user(
    hd: &HelpDesk,
    identifier: Option<&str>,
) -> anyhow::Result<Option<User>> {
    match identifier {
        Some(id) => Ok(Some(resolve_user(hd, id).await?)),
        None => Ok(hd.current_user().await?),
    }
}

async fn handle_user(hd: &HelpDesk, action: UserAction) -> anyhow::Result<()> {
    match action {
        UserAction::Add {
            email,
            name,
            role,
            department,
        } => {
            let user = hd
                .register_user(NewUser {
                    email,
                    name,
                    role: role.parse::<Role>()?,
                    department,
                })
                .await?;
            println!("Registered {} ({})", user.id, user.email);
        }
        UserAction::List { json } => {
            let users = hd.list_users().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else {
                for u in &users {
                    println!(
                        "{:<14} {:<28} {:<22} {:<13} {}",
                        u.id,
                        u.email,
                        u.name,
                        u.role,
                        u.department.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }
    Ok(())
}

async fn handle_metrics(
    hd: &HelpDesk,
    json: bool,
    as_of: Option<&str>,
    week_start: Option<&str>,
) -> anyhow::Result<()> {
    let mut options = hd.metrics_options().await?;
    if let Some(day) = week_start {
        options.week_start = date_util::parse_weekday(day)?;
    }
    let now = match as_of {
        Some(s) => date_util::parse_instant(s)?,
        None => date_util::now(),
    };

    let m = hd.kpi_metrics(now, &options).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&m)?);
    } else {
        print!("{}", report::metrics_report(&m));
    }
    Ok(())
}

async fn handle_config(hd: &HelpDesk, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => match hd.config_get(&key).await? {
            Some(v) => println!("{key} = {v}"),
            None => println!("{key} is not set"),
        },
        ConfigAction::Set { key, value } => {
            hd.config_set(&key, &value).await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items = hd.config_list().await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {v}");
                }
            }
        }
    }
    Ok(())
}

async fn print_status(hd: &HelpDesk) -> anyhow::Result<()> {
    let counts = hd.status_counts().await?;
    let users = hd.list_users().await?;
    let current = hd.config_get(helpdesk_kpi::CONFIG_CURRENT_USER).await?;

    let total: u64 = counts.iter().map(|(_, n)| n).sum();
    println!("Helpdesk Status");
    println!("  Tickets:   {total}");
    for (status, n) in &counts {
        println!("    {status:<12} {n}");
    }
    println!("  Users:     {}", users.len());
    println!(
        "  Acting as: {}",
        current.unwrap_or_else(|| "not set".to_string())
    );
    Ok(())
}

fn print_ticket_line(t: &Ticket) {
    let assignee = t.assigned_to_name.as_deref().unwrap_or("unassigned");
    println!(
        "[{}] {} ({}) - {} / {} | {assignee} | created {}",
        t.status,
        t.title,
        t.id,
        t.category,
        t.priority,
        date_util::date_key(t.created_at)
    );
}

fn print_ticket(t: &Ticket) {
    print_ticket_line(t);
    println!("  Created by: {}", t.created_by_name);
    if !t.description.is_empty() {
        println!("  Description: {}", t.description);
    }
    if let Some(steps) = &t.resolution_steps {
        println!("  Resolution: {steps}");
    }
    if let Some(at) = t.resolved_at {
        println!(
            "  Resolved: {} by {}",
            date_util::format_instant(at),
            t.resolved_by_name.as_deref().unwrap_or("unknown")
        );
    }
    for c in &t.comments {
        println!(
            "  - {} ({}): {}",
            c.user_name,
            date_util::format_instant(c.created_at),
            c.content
        );
    }
}
