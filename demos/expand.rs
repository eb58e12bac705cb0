use std::{error::Error, io, io::Write};

use terminfo_eval::{Capability, ExpandContext, Parameter, open_env};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    // RUST_LOG=terminfo_eval=trace shows each expansion and the conditional
    // branch it takes, debug shows the located and decoded entry.
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("terminfo_eval=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let terminfo = open_env()?;
    println!("Terminal: {}", terminfo.primary_name());

    let Ok(Capability::String(cap)) = terminfo.get_by_alias("setaf") else {
        println!("Your terminal has no foreground color capability");
        return Ok(());
    };
    println!("Found setaf={:#?}", String::from_utf8_lossy(cap));

    let colors = match terminfo.get_by_alias("colors") {
        Ok(Capability::Number(colors)) => i32::from(colors),
        _ => 8,
    };

    let mut context = ExpandContext::new();
    let mut stdout = io::stdout();
    for color in 0..colors.min(16) {
        let expanded = context.expand(cap, &[Parameter::from(color)])?;
        stdout.write_all(&expanded)?;
        println!("Color {color}");
    }
    if let Ok(reset) = terminfo.expand(&mut context, "sgr0", &[]) {
        stdout.write_all(&reset)?;
    }

    Ok(())
}
