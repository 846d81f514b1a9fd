//! Two-way binding example

use filament::{BindSet, Var};

fn main() {
    println!("=== Two-Way Binding Example ===\n");

    let celsius = Var::new(20.0_f64);
    let fahrenheit = Var::new(0.0_f64);

    let binding = celsius.bind_map(
        &fahrenheit,
        BindSet::LeftToRight,
        |c: &f64| c * 9.0 / 5.0 + 32.0,
        |f: &f64| (f - 32.0) * 5.0 / 9.0,
    );
    println!(
        "After bind: {:.1} C = {:.1} F",
        celsius.get(),
        fahrenheit.get()
    );

    println!("Setting 100 F...");
    fahrenheit.set(100.0);
    println!("Celsius followed: {:.1} C", celsius.get());

    println!("Setting 0 C...");
    celsius.set(0.0);
    println!("Fahrenheit followed: {:.1} F", fahrenheit.get());

    binding.detach();
    celsius.set(50.0);
    println!(
        "After detach, setting 50 C leaves fahrenheit at {:.1} F",
        fahrenheit.get()
    );
}
