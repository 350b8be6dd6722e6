use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use eventboard_core::{
    data::{CategoryId, Event, EventDraft, EventId, Moment},
    filter::EventFilter,
    sync::{
        submit::{register_interest, subscribe_newsletter},
        CollectionStore, Collections, HttpGateway,
    },
    GatewayConfig,
};

/// Used when RUST_LOG is unset: the binary's and the library's own logs at
/// info, everything else at warn.
const DEFAULT_LOG_FILTER: &str = "eventboard=info,eventboard_core=info,warn";

/// Browse and manage events on the event board.
#[derive(Parser, Debug)]
#[command(name = "eventboard", version)]
struct Cli {
    /// Base URL of the resource API. Overrides EVENTBOARD_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List events, optionally filtered by title and categories
    List {
        #[arg(short, long, default_value = "")]
        search: String,
        /// Only show events in any of these categories
        #[arg(short, long = "category")]
        categories: Vec<u64>,
    },
    /// List the available categories
    Categories,
    /// Show a single event
    Show { id: u64 },
    /// Create a new event
    Create(EventFields),
    /// Edit an existing event; omitted fields keep their current value
    Edit {
        id: u64,
        #[command(flatten)]
        fields: EventFields,
    },
    /// Delete an event
    Delete { id: u64 },
    /// Register interest in attending an event
    Register {
        id: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// Sign up for the newsletter
    Newsletter {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
}

#[derive(Args, Debug)]
struct EventFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    image: Option<String>,
    #[arg(long)]
    location: Option<String>,
    /// e.g. 2024-05-01T09:30 or 2024-05-01T09:30:00Z
    #[arg(long)]
    start: Option<Moment>,
    #[arg(long)]
    end: Option<Moment>,
    /// Category ID; repeat for several. Replaces the current categories.
    #[arg(long = "category")]
    categories: Vec<u64>,
}

impl EventFields {
    fn into_new_draft(self) -> Result<EventDraft> {
        let (Some(title), Some(start_time), Some(end_time)) = (self.title, self.start, self.end)
        else {
            bail!("--title, --start and --end are required to create an event");
        };
        Ok(EventDraft {
            title,
            description: self.description.unwrap_or_default(),
            image: self.image.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            start_time,
            end_time,
            category_ids: self.categories.into_iter().map(CategoryId).collect(),
        })
    }

    fn apply_to(self, mut draft: EventDraft) -> EventDraft {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        if let Some(image) = self.image {
            draft.image = image;
        }
        if let Some(location) = self.location {
            draft.location = location;
        }
        if let Some(start) = self.start {
            draft.start_time = start;
        }
        if let Some(end) = self.end {
            draft.end_time = end;
        }
        if !self.categories.is_empty() {
            draft.category_ids = self.categories.into_iter().map(CategoryId).collect();
        }
        draft
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = GatewayConfig::from_env().context("invalid configuration")?;
    if let Some(url) = cli.api_url {
        config = config.with_base_url(url)?;
    }
    tracing::debug!("using resource API at {}", config.base_url);
    let store = CollectionStore::new(HttpGateway::new(config)?);

    run(cli.command, &store).await
}

async fn run(command: Command, store: &CollectionStore<HttpGateway>) -> Result<()> {
    match command {
        Command::List { search, categories } => {
            store.load().await.context("failed to load events")?;
            let filter = EventFilter::new(search, categories.into_iter().map(CategoryId).collect());
            let collections = store.collections();
            let shown = filter.apply(collections.events());
            for event in &shown {
                println!("{}", summary_line(event, &collections));
            }
            if shown.is_empty() {
                println!("No events found.");
            }
        }
        Command::Categories => {
            store.load().await.context("failed to load categories")?;
            for category in store.categories() {
                println!("{:>4}  {}", category.id.0, category.name);
            }
        }
        Command::Show { id } => {
            store.load().await.context("failed to load categories")?;
            let event = store.refresh_event(EventId(id)).await.context("failed to fetch event")?;
            print_details(&event, &store.collections());
        }
        Command::Create(fields) => {
            let draft = fields.into_new_draft()?;
            let created = store.create(&draft).await.context("failed to create event")?;
            println!("Created event {}.", created.id);
        }
        Command::Edit { id, fields } => {
            let id = EventId(id);
            let current = store.refresh_event(id).await.context("failed to fetch event")?;
            let draft = fields.apply_to(current.to_draft());
            let updated = store.update(id, &draft).await.context("failed to update event")?;
            println!("Updated event {}.", updated.id);
        }
        Command::Delete { id } => {
            store.remove(EventId(id)).await.context("failed to delete event")?;
            println!("Deleted event {id}.");
        }
        Command::Register { id, name, email } => {
            register_interest(store.api(), EventId(id), &name, &email)
                .await
                .context("registration failed")?;
            println!("Your registration was sent.");
        }
        Command::Newsletter { name, email } => {
            subscribe_newsletter(store.api(), &name, &email).await.context("signup failed")?;
            println!("You are subscribed to the newsletter.");
        }
    }
    Ok(())
}

fn category_names(event: &Event, collections: &Collections) -> String {
    let names: Vec<&str> = collections
        .category_index()
        .names_for(event)
        .filter(|name| !name.is_empty())
        .collect();
    names.join(", ")
}

fn summary_line(event: &Event, collections: &Collections) -> String {
    let categories = category_names(event, collections);
    if categories.is_empty() {
        format!("{:>4}  {}  ({})", event.id.0, event.title, event.start_time)
    } else {
        format!("{:>4}  {}  ({})  [{}]", event.id.0, event.title, event.start_time, categories)
    }
}

fn print_details(event: &Event, collections: &Collections) {
    println!("{}", event.title);
    println!("  when:       {} - {}", event.start_time, event.end_time);
    if !event.location.is_empty() {
        println!("  where:      {}", event.location);
    }
    let categories = category_names(event, collections);
    if categories.is_empty() {
        println!("  categories: none");
    } else {
        println!("  categories: {categories}");
    }
    if !event.image.is_empty() {
        println!("  image:      {}", event.image);
    }
    if !event.description.is_empty() {
        println!();
        println!("{}", event.description);
    }
}
