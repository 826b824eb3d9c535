use colored::Colorize;

use crate::Context;
use crate::engine::STEPS;
use crate::ui;

pub fn run(_ctx: &Context) {
    ui::header("Provisioning Steps");
    println!();
    for (i, step) in STEPS.iter().enumerate() {
        println!(
            "  {} {:<13} {} {}",
            format!("{:>2}.", i + 1).bold(),
            step.name,
            step.description,
            format!("[{}]", step.criticality.label()).dimmed()
        );
        if !step.aliases.is_empty() {
            ui::dim(&format!("      aliases: {}", step.aliases.join(", ")));
        }
    }
    println!();
    ui::dim("Select with --only a,b or --skip a,b (names or aliases).");
}
