//! Museum Tour Backend - binary entry point
//! Delegates to the library for all app logic.

#[tokio::main]
async fn main() {
    museum_tour_backend::run().await;
}
