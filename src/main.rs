use roofline_runner::{clean_logger, cli};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let res = cli::run().await;
    if let Err(err) = res {
        // Errors raised before the logger is ready still have to reach the user
        if log::max_level() >= log::LevelFilter::Error {
            log::error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }
        clean_logger();
        std::process::exit(1);
    }
    clean_logger();
}
