use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;

fn main() {
    println!("🔐 Render Callback Secret Generator");
    println!("===================================");

    // 256 bits from the OS-seeded thread rng
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);

    let encoded = URL_SAFE_NO_PAD.encode(key);
    let hex_key = hex::encode(key);

    println!();
    println!("Base64: {}", encoded);
    println!("Hex:    {}", hex_key);
    println!();
    println!("📝 Set the same value on this service and on the render worker:");
    println!("VIDEO_WEBHOOK_SECRET={}", encoded);
}
