//! Derived state example

use filament::{State, Var};

fn main() {
    println!("=== Derived State Example ===\n");

    let quantity = Var::new(2);
    let unit_price = Var::new(30);

    // The expression's reads are captured automatically; total now
    // recomputes whenever quantity or unit_price changes.
    let total = State::new({
        let quantity = quantity.clone();
        let unit_price = unit_price.clone();
        move || quantity.get() * unit_price.get()
    });

    total.attach(|value| {
        println!("Total changed to: {value}");
    });

    println!("Initial total: {}", total.get());

    println!("Setting quantity to 5...");
    quantity.set(5);

    println!("Setting unit price to 25...");
    unit_price.set(25);

    // Self-referential write: the old value is read one step up the
    // previous-function stack.
    println!("Doubling the quantity in place...");
    quantity.define({
        let quantity = quantity.clone();
        move || quantity.get() * 2
    });

    println!("Final total: {}", total.get());
}
