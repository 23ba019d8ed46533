use std::sync::Arc;

use api_client::{ApiConfig, EventsClient, EventsGateway};
use clap::{Parser, Subcommand};
use events_commands::{
    CreateEventCommand, DeleteEventCommand, UpdateEventCommand,
};
use events_command_handlers::{
    CreateEventHandler, DeleteEventHandler, UpdateEventHandler,
};
use events_models::{Event, EventDraft};
use events_queries::{GetEventQuery, ListEventsQuery, ListImagesQuery};
use events_query_handlers::{
    GetEventQueryHandler, ListEventsQueryHandler, ListImagesQueryHandler,
};
use query_cache::QueryCache;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "events-cli",
    about = "Browse and manage events against the backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List events, optionally filtered by search term and count
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        max: Option<u32>,
    },
    /// Show one event
    Show { id: String },
    /// Create an event
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        date: String,
        #[arg(long)]
        time: String,
        #[arg(long)]
        location: String,
        #[arg(long)]
        image: String,
    },
    /// Update fields of an event in place
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        image: Option<String>,
    },
    /// Delete an event
    Delete { id: String },
    /// List the selectable event images
    Images,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = ApiConfig::from_env();
    info!("using backend at {}", config.base_url);
    let gateway: Arc<dyn EventsGateway> =
        Arc::new(EventsClient::new(&config)?);
    let cache = QueryCache::with_defaults();
    let _maintenance = cache.start_maintenance();

    match cli.command {
        Command::List { search, max } => {
            let handler =
                ListEventsQueryHandler::new(gateway, cache.clone());
            let events =
                handler.execute(ListEventsQuery { search, max }).await?;
            if events.is_empty() {
                println!("No events found.");
            }
            for event in &events {
                println!("{}", render(event));
            }
        }
        Command::Show { id } => {
            let handler = GetEventQueryHandler::new(gateway, cache.clone());
            let event =
                handler.execute(GetEventQuery { event_id: id }).await?;
            println!("{}", render(&event));
            println!("  {}", event.description);
        }
        Command::Create {
            title,
            description,
            date,
            time,
            location,
            image,
        } => {
            let handler = CreateEventHandler::new(gateway, cache.clone());
            let created = handler
                .execute(CreateEventCommand {
                    event: EventDraft {
                        title,
                        description,
                        date,
                        time,
                        location,
                        image,
                    },
                })
                .await?;
            println!("Created event {}", created.id);
        }
        Command::Update {
            id,
            title,
            description,
            date,
            time,
            location,
            image,
        } => {
            let get_handler =
                GetEventQueryHandler::new(gateway.clone(), cache.clone());
            let current = get_handler
                .execute(GetEventQuery {
                    event_id: id.clone(),
                })
                .await?;
            let mut draft = EventDraft::from(current);
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(description) = description {
                draft.description = description;
            }
            if let Some(date) = date {
                draft.date = date;
            }
            if let Some(time) = time {
                draft.time = time;
            }
            if let Some(location) = location {
                draft.location = location;
            }
            if let Some(image) = image {
                draft.image = image;
            }
            let handler = UpdateEventHandler::new(gateway, cache.clone());
            handler
                .execute(UpdateEventCommand {
                    event_id: id.clone(),
                    event: draft,
                })
                .await?;
            println!("Updated event {id}");
        }
        Command::Delete { id } => {
            let handler = DeleteEventHandler::new(gateway, cache.clone());
            handler
                .execute(DeleteEventCommand {
                    event_id: id.clone(),
                })
                .await?;
            println!("Deleted event {id}");
        }
        Command::Images => {
            let handler = ListImagesQueryHandler::new(gateway, cache.clone());
            let images = handler.execute(ListImagesQuery::default()).await?;
            for image in images {
                println!("{}  {}", image.path, image.caption);
            }
        }
    }

    Ok(())
}

fn render(event: &Event) -> String {
    format!(
        "{}  {}  {} @ {}  ({})",
        event.id, event.title, event.date, event.time, event.location
    )
}
