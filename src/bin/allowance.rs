use std::{error::Error, io, path::PathBuf, process::exit};

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use allowance_rs::{
    Amount, NewTransaction, Role, Transaction, TransactionType,
    client::{ApiClient, ApiError, FileTokenStorage, Session, SessionController, View},
};

/// A terminal client for the allowance tracker.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// The URL of the allowance server.
    #[arg(long, env = "ALLOWANCE_SERVER", default_value = "http://localhost:3000")]
    server: String,

    /// Where to keep the access token between runs. Defaults to `~/.allowance_token`.
    #[arg(long, env = "ALLOWANCE_TOKEN_PATH")]
    token_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account.
    Register {
        /// The name to log in with.
        name: String,
        /// Either "admin" or "child".
        #[arg(long, default_value = "child")]
        role: Role,
    },
    /// Log in and remember the session.
    Login {
        /// The name you registered with.
        name: String,
    },
    /// Forget the saved session.
    Logout,
    /// Show who is logged in.
    Whoami,
    /// List the transactions you can see, newest first.
    List,
    /// Submit a new transaction.
    Submit {
        /// What the money was for.
        description: String,
        /// How much money, e.g. 5.50.
        amount: Decimal,
        /// Either "income" or "expense".
        #[arg(long = "type", default_value = "expense")]
        transaction_type: TransactionType,
        /// The child the transaction is for. Defaults to yourself.
        #[arg(long)]
        child: Option<String>,
    },
    /// Approve a pending transaction (admins only).
    Approve {
        /// The transaction's ID, as shown by `list`.
        id: i64,
    },
    /// Decline a pending transaction (admins only).
    Decline {
        /// The transaction's ID, as shown by `list`.
        id: i64,
    },
    /// List the registered children (admins only).
    Children,
    /// Show the balances you can see.
    Balances,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let client = ApiClient::new(&args.server);
    let token_path = match args.token_path {
        Some(token_path) => token_path,
        None => default_token_path(),
    };

    let mut session = SessionController::new(FileTokenStorage::new(token_path));
    session.restore()?;

    let result = run(args.command, &client, &mut session).await;

    if let Err(error) = result {
        if session.handle_api_error(&error)? {
            print_error("Your session has expired, log in again.");
        } else {
            print_error(error);
        }
        exit(1);
    }

    Ok(())
}

fn default_token_path() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".allowance_token")
}

async fn run(
    command: Command,
    client: &ApiClient,
    session: &mut SessionController<FileTokenStorage>,
) -> Result<(), ApiError> {
    match command {
        Command::Register { name, role } => {
            let Some(password) = prompt_new_password() else {
                return Ok(());
            };
            let user = client.register(&name, &password, role).await?;
            println!("Registered {} as {}.", user.name, user.role);
        }
        Command::Login { name } => {
            let Some(password) = prompt_password("Password: ") else {
                return Ok(());
            };
            let token = client.log_in(&name, &password).await?;
            match session.log_in(&token) {
                Ok(new_session) => println!("Logged in as {}.", new_session.user.name),
                Err(error) => print_error(error),
            }
        }
        Command::Logout => match session.log_out() {
            Ok(()) => println!("Logged out."),
            Err(error) => print_error(error),
        },
        Command::Whoami => match session.view() {
            Some(View::Home(user)) => println!("{} ({})", user.name, user.role),
            _ => println!("Not logged in."),
        },
        Command::List => {
            let session = require_session(session);
            let transactions = client.transactions(&session.token).await?;
            print_transactions(&transactions);
        }
        Command::Submit {
            description,
            amount,
            transaction_type,
            child,
        } => {
            let session = require_session(session);
            let amount = match Amount::new(amount) {
                Ok(amount) => amount,
                Err(error) => {
                    print_error(error);
                    exit(1);
                }
            };
            let new_transaction = NewTransaction {
                description,
                amount,
                transaction_type,
                child_name: child.unwrap_or_else(|| session.user.name.clone()),
            };
            let transaction = client
                .create_transaction(&session.token, &new_transaction)
                .await?;
            println!("Created transaction #{} ({}).", transaction.id, transaction.status);
        }
        Command::Approve { id } => {
            let session = require_session(session);
            let transaction = client.approve(&session.token, id).await?;
            println!("Transaction #{} is {}.", transaction.id, transaction.status);
        }
        Command::Decline { id } => {
            let session = require_session(session);
            let transaction = client.decline(&session.token, id).await?;
            println!("Transaction #{} is {}.", transaction.id, transaction.status);
        }
        Command::Children => {
            let session = require_session(session);
            for name in client.children(&session.token).await? {
                println!("{name}");
            }
        }
        Command::Balances => {
            let session = require_session(session);
            for balance in client.balances(&session.token).await? {
                println!("{:<16} ${}", balance.child_name, balance.balance);
            }
        }
    }

    Ok(())
}

/// Exit unless someone is logged in.
fn require_session(session: &SessionController<FileTokenStorage>) -> Session {
    match session.session() {
        Some(session) => session.clone(),
        None => {
            print_error("Not logged in. Run `allowance login <name>` first.");
            exit(1);
        }
    }
}

fn print_transactions(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("No transactions yet.");
        return;
    }

    for transaction in transactions {
        let sign = match transaction.transaction_type {
            TransactionType::Income => "+",
            TransactionType::Expense => "-",
        };

        println!(
            "#{:<4} {} {:<8} {}${:<8} {:<12} {}",
            transaction.id,
            transaction.created_at.date(),
            transaction.status.as_str(),
            sign,
            transaction.amount.to_string(),
            transaction.child_name,
            transaction.description,
        );
    }
}

fn prompt_password(prompt: &str) -> Option<String> {
    match rpassword::prompt_password(prompt) {
        Ok(password) => Some(password),
        Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(error) => {
            print_error(format!("Could not read password from stdin: {error}"));
            None
        }
    }
}

fn prompt_new_password() -> Option<String> {
    loop {
        let first_password = prompt_password("Enter a password: ")?;

        if first_password.is_empty() {
            print_error("Password cannot be empty, try again.");
            continue;
        }

        let second_password = prompt_password("Enter the same password again: ")?;

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        return Some(first_password);
    }
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

/// From https://crates.io/crates/capitalize
fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}
