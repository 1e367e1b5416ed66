//! Mint a single-use promotion code that turns a user into a tour producer.

use museum_tour_backend::db::{self, models::PromotionCode, Db, PgDocumentStore};
use museum_tour_backend::error::StoreError;
use rand::distr::{Alphanumeric, SampleString};
use std::sync::Arc;
use uuid::Uuid;

const CODE_LENGTH: usize = 5;
const MAX_ATTEMPTS: usize = 10;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Usage: DATABASE_URL=postgres://... cargo run --bin mint-code");
        std::process::exit(1);
    }

    let store = match db::init_pool(None).await {
        Ok(pool) => PgDocumentStore::new(pool),
        Err(e) => {
            eprintln!("Error connecting to database: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = store.run_migrations().await {
        eprintln!("Error preparing database: {}", e);
        std::process::exit(1);
    }
    let db = Db::new(Arc::new(store));

    for _ in 0..MAX_ATTEMPTS {
        let code = PromotionCode {
            id: Uuid::new_v4(),
            code: Alphanumeric.sample_string(&mut rand::rng(), CODE_LENGTH),
        };
        match db.insert(&code).await {
            Ok(()) => {
                println!("\nCode : {}\n", code.code);
                println!("# Hand this to the new producer; it can be redeemed once.");
                return;
            }
            Err(StoreError::Conflict { .. }) => continue,
            Err(e) => {
                eprintln!("Error storing code: {}", e);
                std::process::exit(1);
            }
        }
    }

    eprintln!("Could not find an unused code after {} attempts", MAX_ATTEMPTS);
    std::process::exit(1);
}
