use age::{secrecy::ExposeSecret as _, x25519::Identity};
use base64::Engine as _;
use color_eyre::eyre::Result;
use rand::RngCore as _;

fn main() -> Result<()> {
    color_eyre::install()?;

    // Age identity used to encrypt identity-provider tokens at rest
    let identity = Identity::generate();
    let age_key = identity.to_string();
    let age_key = age_key.expose_secret();

    // 64 bytes of key material for the private cookie jar
    let mut cookie_key = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut cookie_key);
    let cookie_key = base64::engine::general_purpose::STANDARD.encode(cookie_key);

    println!("Generated keys for imagic.");
    println!();
    println!("Add the following to your .env file:");
    println!("ENCRYPTION_KEY=\"{}\"", age_key);
    println!("COOKIE_KEY=\"{}\"", cookie_key);

    Ok(())
}
