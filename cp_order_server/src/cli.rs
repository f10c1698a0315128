use std::{env, env::VarError};

/// The server takes no arguments. Any argument prints the help text and exits.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "CP_HOST",
        "CP_PORT",
        "CP_WS_PORT",
        "CP_DATABASE_URL",
        "CP_PAYMENT_PROVIDER",
        "CP_RAZORPAY_KEY_ID",
        "CP_RAZORPAY_WEBHOOK_CHECKS",
        "CP_PAYMENT_INTENT_TTL",
        "CP_FREE_DELIVERY_THRESHOLD",
        "CP_DELIVERY_FEE",
        "CP_TAX_RATE_BPS",
        "CP_USE_X_FORWARDED_FOR",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
