use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use rust_decimal::Decimal;

use allowance_rs::{
    Amount, Caller, NewTransaction, PasswordHash, Role, TransactionType, create_transaction,
    create_user, initialize_db,
};

/// A utility for creating a test database for the allowance server.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
///
/// Every test user has the password "test".
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test users...");

    let password_hash = PasswordHash::new("test", PasswordHash::DEFAULT_COST)?;
    let mum = create_user("Mum", password_hash.clone(), Role::Admin, &conn)?;
    let ann = create_user("Ann", password_hash.clone(), Role::Child, &conn)?;
    let bob = create_user("Bob", password_hash, Role::Child, &conn)?;

    println!("Creating test transactions...");

    let as_caller = |user: &allowance_rs::User| Caller {
        id: user.id,
        name: user.name.clone(),
        role: user.role,
    };

    let samples = [
        (&mum, "Pocket money", 1000, TransactionType::Income, &ann),
        (&mum, "Pocket money", 1000, TransactionType::Income, &bob),
        (&ann, "Candy", 550, TransactionType::Expense, &ann),
        (&bob, "Mowed the lawn", 1500, TransactionType::Income, &bob),
    ];

    for (submitter, description, cents, transaction_type, child) in samples {
        create_transaction(
            &as_caller(submitter),
            NewTransaction {
                description: description.to_owned(),
                amount: Amount::new(Decimal::new(cents, 2))?,
                transaction_type,
                child_name: child.name.clone(),
            },
            &conn,
        )?;
    }

    println!("Success!");

    Ok(())
}
