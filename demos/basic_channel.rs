//! Basic channel example

use filament::Channel;

fn main() {
    println!("=== Basic Channel Example ===\n");

    // A channel stores nothing; every write fires straight through.
    let temperature: Channel<f64> = Channel::new();

    temperature.attach(|degrees| {
        println!("Temperature is now {degrees:.1} C");
    });
    temperature.once(|degrees| {
        println!("First reading received: {degrees:.1} C");
    });

    println!("Sending 21.5...");
    temperature.set(21.5);

    println!("Sending 23.0...");
    temperature.set(23.0);
}
