use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use shared::{
    domain::{
        EventId, MemberId, MemberRole, NewMember, NewTemplateItem, SectionDraft, SectionId,
        SectionKind, TemplateId,
    },
    live::format_clock,
};
use storage::Storage;
use tracing_subscriber::EnvFilter;

mod seed;

#[derive(Parser, Debug)]
#[command(about = "Administration of events, programs, members and templates")]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/service.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateEvent {
        title: String,
        /// RFC 3339 timestamp, e.g. 2026-03-01T08:15:00Z.
        date: DateTime<Utc>,
        #[arg(long)]
        template_id: Option<i64>,
    },
    ListEvents,
    DeleteEvent {
        event_id: i64,
    },
    ListSections {
        event_id: i64,
    },
    AddSection {
        event_id: i64,
        title: String,
        #[arg(long)]
        duration: Option<i64>,
        #[arg(long)]
        kind: Option<String>,
        #[arg(long)]
        member_id: Option<i64>,
    },
    /// Rewrite the program order; every section id of the event must be given.
    ReorderSections {
        event_id: i64,
        #[arg(required = true)]
        section_ids: Vec<i64>,
    },
    CreateMember {
        full_name: String,
        #[arg(long, default_value = "SERVITEUR")]
        role: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        matricule: Option<String>,
    },
    ListMembers {
        #[arg(long)]
        search: Option<String>,
    },
    DeleteMember {
        member_id: i64,
    },
    CreateTemplate {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    ListTemplates,
    AddTemplateItem {
        template_id: i64,
        title: String,
        duration: i64,
        #[arg(long)]
        kind: Option<String>,
    },
    DeleteTemplate {
        template_id: i64,
    },
    /// Install the standard Sunday template.
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateEvent {
            title,
            date,
            template_id,
        } => {
            let title = title.trim();
            if title.is_empty() {
                bail!("event title must not be empty");
            }
            let event = match template_id {
                Some(template_id) => {
                    storage
                        .create_event_from_template(title, date, TemplateId(template_id))
                        .await?
                }
                None => storage.create_event(title, date).await?,
            };
            println!("created event_id={}", event.id);
        }
        Command::ListEvents => {
            for event in storage.list_events().await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    event.id,
                    event.date.to_rfc3339(),
                    event.status,
                    event.title
                );
            }
        }
        Command::DeleteEvent { event_id } => {
            if !storage.delete_event(EventId(event_id)).await? {
                bail!("event {event_id} not found");
            }
            println!("deleted event_id={event_id}");
        }
        Command::ListSections { event_id } => {
            for section in storage.list_sections(EventId(event_id)).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}{}",
                    section.id,
                    section.order_index,
                    format_clock(section.duration),
                    section.kind.as_str(),
                    section.title,
                    if section.is_unplanned { " *" } else { "" }
                );
            }
        }
        Command::AddSection {
            event_id,
            title,
            duration,
            kind,
            member_id,
        } => {
            if duration.is_some_and(|duration| duration < 0) {
                bail!("duration must not be negative");
            }
            let event_id = EventId(event_id);
            if storage.get_event(event_id).await?.is_none() {
                bail!("event {event_id} not found");
            }
            let draft = SectionDraft {
                title: Some(title),
                duration,
                kind: kind.as_deref().map(SectionKind::parse),
                member_id: member_id.map(|id| Some(MemberId(id))),
            };
            let section = storage.append_section(event_id, &draft).await?;
            println!(
                "added section_id={} at order_index={}",
                section.id, section.order_index
            );
        }
        Command::ReorderSections {
            event_id,
            section_ids,
        } => {
            let ordered: Vec<SectionId> = section_ids.into_iter().map(SectionId).collect();
            let sections = storage
                .reorder_sections(EventId(event_id), &ordered)
                .await?;
            println!("reordered {} sections", sections.len());
        }
        Command::CreateMember {
            full_name,
            role,
            phone,
            matricule,
        } => {
            let role = MemberRole::parse(&role).ok_or_else(|| anyhow!("unknown role: {role}"))?;
            if full_name.trim().is_empty() {
                bail!("member name must not be empty");
            }
            let member = storage
                .create_member(&NewMember {
                    full_name,
                    role,
                    phone,
                    matricule,
                })
                .await?;
            println!("created member_id={} matricule={}", member.id, member.matricule);
        }
        Command::ListMembers { search } => {
            for member in storage.list_members(search.as_deref()).await? {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    member.id,
                    member.matricule,
                    member.role.as_str(),
                    member.full_name,
                    member.phone.as_deref().unwrap_or("")
                );
            }
        }
        Command::DeleteMember { member_id } => {
            if !storage.delete_member(MemberId(member_id)).await? {
                bail!("member {member_id} not found");
            }
            println!("deleted member_id={member_id}");
        }
        Command::CreateTemplate { name, description } => {
            let template = storage
                .create_template(name.trim(), description.as_deref())
                .await?;
            println!("created template_id={}", template.id);
        }
        Command::ListTemplates => {
            for template in storage.list_templates().await? {
                let total: i64 = storage
                    .list_template_items(template.id)
                    .await?
                    .iter()
                    .map(|item| item.duration)
                    .sum();
                println!(
                    "{}\t{}\t{}",
                    template.id,
                    format_clock(total),
                    template.name
                );
            }
        }
        Command::AddTemplateItem {
            template_id,
            title,
            duration,
            kind,
        } => {
            if duration < 0 {
                bail!("duration must not be negative");
            }
            let item = storage
                .add_template_item(
                    TemplateId(template_id),
                    &NewTemplateItem {
                        title,
                        duration,
                        kind: kind.as_deref().map(SectionKind::parse).unwrap_or_default(),
                    },
                )
                .await?;
            println!("added item_id={} at order_index={}", item.id, item.order_index);
        }
        Command::DeleteTemplate { template_id } => {
            if !storage.delete_template(TemplateId(template_id)).await? {
                bail!("template {template_id} not found");
            }
            println!("deleted template_id={template_id}");
        }
        Command::Seed => {
            let (template, created) = seed::seed_sunday_template(&storage).await?;
            if created {
                println!("seeded template_id={}", template.id);
            } else {
                println!("template_id={} already present", template.id);
            }
        }
    }

    Ok(())
}
