const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn show_version() {
    println!("\x1b[38;5;46mpromexec\x1b[0m {}", BUILD_VERSION);
    println!("\x1b[38;5;245m{}\x1b[0m", "═".repeat(40));
    println!("  Profile:   {}", if cfg!(debug_assertions) { "debug" } else { "release" });
    println!("  Platform:  {}/{}", std::env::consts::OS, std::env::consts::ARCH);
    println!("  Scraper:   reqwest (rustls)");
    println!("  Runtime:   tokio");
}
