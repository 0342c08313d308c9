use clap::{Parser, Subcommand};
use serde::Serialize;

use docserial::config::{Config, DatabaseSettings};
use docserial::database::{self, types::DocumentType};
use docserial::services::documents::{CreateDocument, DocumentService};
use docserial::services::lifecycle::DeleteMode;

// Определяем структуру команд CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, verbatim_doc_comment)]
/// Утилита командной строки для нумерации документов.
/// Создаёт схему, выдаёт номера, удаляет и восстанавливает документы.
struct Cli {
    /// Строка подключения; по умолчанию DATABASE_URL.
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Команды для работы с базой данных.
    Db {
        #[command(subcommand)]
        db_command: DbCommand,
    },
    /// Показывает номер, который получит следующий документ (ничего не записывает).
    Next {
        #[command(flatten)]
        scope: Scope,

        /// ID клиента.
        #[arg(short, long)]
        customer: Option<i64>,

        /// Префикс клиента для {{CUSTOMER_SERIES}}.
        #[arg(long)]
        customer_series: Option<String>,

        /// Шаблон номера вместо настроенного.
        #[arg(short, long)]
        format: Option<String>,
    },
    /// Создаёт документ с выделенным номером.
    Create {
        #[command(flatten)]
        scope: Scope,

        #[arg(short, long)]
        customer: Option<i64>,

        #[arg(long)]
        customer_series: Option<String>,

        #[arg(short, long)]
        format: Option<String>,

        /// Номер вручную (должен соответствовать шаблону).
        #[arg(short, long)]
        number: Option<String>,
    },
    /// Мягко удаляет документ и освобождает номер; --force удаляет строку.
    Delete {
        #[command(flatten)]
        scope: Scope,

        #[arg(long)]
        id: i64,

        #[arg(long)]
        force: bool,
    },
    /// Восстанавливает мягко удалённый документ.
    Restore {
        #[command(flatten)]
        scope: Scope,

        #[arg(long)]
        id: i64,
    },
    /// Выводит документы арендатора.
    List {
        #[command(flatten)]
        scope: Scope,

        #[arg(long)]
        include_deleted: bool,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommand {
    /// Создаёт таблицу `documents` и уникальный индекс номеров.
    Init,
    /// Проверяет соединение с БД.
    Ping,
}

#[derive(clap::Args, Debug)]
struct Scope {
    /// ID арендатора (компании).
    #[arg(short, long)]
    tenant: i64,

    /// Тип документа: invoice, estimate или payment.
    #[arg(short = 'k', long = "type")]
    document_type: DocumentType,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("warn"));
    let cli = Cli::parse();

    // Для CLI host/port не важны, поэтому при их отсутствии берём локальные значения
    let config = Config::from_env().unwrap_or_else(|e| {
        log::warn!("Configuration incomplete ({}), using local defaults", e);
        Config::local("127.0.0.1", 8080)
    });

    let db = match &cli.database_url {
        Some(url) => {
            database::connect_with_settings(&DatabaseSettings::default_from_url(url.clone()))
                .await?
        }
        None => database::connect().await?,
    };

    match cli.command {
        Commands::Db { db_command } => match db_command {
            DbCommand::Init => {
                database::create_schema(&db).await?;
                println!("Схема создана.");
            }
            DbCommand::Ping => {
                database::ping(&db).await?;
                println!("OK");
            }
        },
        Commands::Next {
            scope,
            customer,
            customer_series,
            format,
        } => {
            let service = DocumentService::new(db, config)?;
            let mut request = CreateDocument::new(scope.document_type, scope.tenant);
            request.customer_id = customer;
            request.customer_series = customer_series;
            request.number_format = format;
            print_json(&service.preview_next(&request).await?)?;
        }
        Commands::Create {
            scope,
            customer,
            customer_series,
            format,
            number,
        } => {
            let service = DocumentService::new(db, config)?;
            let request = CreateDocument {
                document_type: scope.document_type,
                tenant_id: scope.tenant,
                customer_id: customer,
                customer_series,
                number_format: format,
                document_number: number,
            };
            print_json(&service.create_with_retry(&request).await?)?;
        }
        Commands::Delete { scope, id, force } => {
            let service = DocumentService::new(db, config)?;
            let mode = if force { DeleteMode::Force } else { DeleteMode::Soft };
            match service
                .delete(scope.tenant, scope.document_type, id, mode)
                .await?
            {
                Some(document) => print_json(&document)?,
                None => println!("Документ {} удалён безвозвратно.", id),
            }
        }
        Commands::Restore { scope, id } => {
            let service = DocumentService::new(db, config)?;
            print_json(&service.restore(scope.tenant, scope.document_type, id).await?)?;
        }
        Commands::List {
            scope,
            include_deleted,
        } => {
            let service = DocumentService::new(db, config)?;
            print_json(
                &service
                    .list(scope.tenant, scope.document_type, include_deleted)
                    .await?,
            )?;
        }
    }

    Ok(())
}
