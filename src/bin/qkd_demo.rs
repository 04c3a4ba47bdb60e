use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::LevelFilter;

use bb84_pipeline::bb84_states::bits_to_string;
use bb84_pipeline::channel::ChannelSimulator;
use bb84_pipeline::{ChannelConfig, ExchangeResult, ProtocolConfig, SessionStore, Variant};

/// Runs one simulated BB84 exchange and prints what each stage produced.
#[derive(Parser, Debug)]
#[command(name = "qkd_demo", version)]
struct Cli {
    /// ideal, noisy, intercept_resend or partial_intercept
    #[arg(long, default_value = "ideal")]
    variant: Variant,

    /// Number of transmitted qubits.
    #[arg(long, default_value_t = 20)]
    qubits: usize,

    /// Bit-flip probability on the noisy channel.
    #[arg(long, default_value_t = 0.05)]
    noise: f64,

    /// Seed for a reproducible exchange.
    #[arg(long)]
    seed: Option<u64>,

    /// Message to encrypt on the fresh run.
    #[arg(long)]
    message: Option<String>,

    /// Second message, encrypted afterwards with the already derived key.
    #[arg(long)]
    reuse: Option<String>,

    /// JSON protocol configuration; overrides the variant preset.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Print the full result as JSON.
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    if cli.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    let protocol = match &cli.config {
        Some(path) => ProtocolConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ProtocolConfig::for_variant(cli.variant),
    };
    let channel = ChannelConfig {
        qubits: cli.qubits,
        noise_probability: cli.noise,
        seed: cli.seed,
    };

    let mut simulator = ChannelSimulator::new(channel).context("invalid channel settings")?;
    let exchange = simulator.transmit(protocol.variant);
    let id = exchange.id;

    let store = SessionStore::new();
    let result = store
        .run(exchange, &protocol, cli.message.as_deref())
        .context("exchange failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&*result)?);
    } else {
        print_summary(&result);
    }

    if let Some(message) = &cli.reuse {
        let reentry = store
            .encrypt_with_existing_key(id, message)
            .context("cannot reuse key")?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&reentry)?);
        } else {
            println!("\n--- Reusing key of exchange {} ---", id);
            println!("Message:   {}", reentry.cipher.original_message);
            println!("Encrypted: {}", reentry.cipher.encrypted_message_hex);
            println!("Decrypted: {}", reentry.cipher.decrypted_message);
        }
    }

    Ok(())
}

fn bases_to_string(bases: &[bb84_pipeline::Basis]) -> String {
    bases.iter().map(|b| b.symbol()).collect()
}

fn print_summary(result: &ExchangeResult) {
    println!("--- BB84 exchange {} ({}) ---", result.exchange_id, result.variant);
    println!("Sender bits:     {}", bits_to_string(&result.sender_bits));
    println!("Sender bases:    {}", bases_to_string(&result.sender_bases));
    println!("Receiver bases:  {}", bases_to_string(&result.receiver_bases));
    println!("Receiver bits:   {}", bits_to_string(&result.receiver_bits));
    if let Some(bits) = &result.eavesdropper_bits {
        let eve: String = bits
            .iter()
            .map(|b| match b {
                Some(true) => '1',
                Some(false) => '0',
                None => '.',
            })
            .collect();
        println!("Eavesdropper:    {}", eve);
    }

    println!("\n--- Sifting ---");
    println!("Kept positions:  {:?}", result.sifted_indices);
    println!("Sender sifted:   {}", bits_to_string(&result.sender_sifted));
    println!("Receiver sifted: {}", bits_to_string(&result.receiver_sifted));
    println!(
        "QBER: {}%  fidelity: {:.3}  loss: {:.3}",
        result.qber.qber_display(),
        result.fidelity,
        result.loss
    );

    if let Some(reason) = &result.abort_reason {
        println!("\n{}", reason);
        return;
    }

    if let Some(key) = &result.error_corrected_key {
        println!("Key after error correction: {}", key);
    }
    if let Some(secret) = &result.final_secret_key {
        println!("Final secret key: {}", secret);
    }
    if let Some(cipher) = &result.cipher {
        println!("\n--- Message ---");
        println!("Message:   {}", cipher.original_message);
        println!("Encrypted: {}", cipher.encrypted_message_hex);
        println!("Decrypted: {}", cipher.decrypted_message);
    }
}
