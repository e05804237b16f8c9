use argh::FromArgs;
use bitcoin::{ScriptBuf, Transaction};
use brc20_inscriber::ParsedEnvelope;

#[derive(FromArgs, Debug)]
#[argh(description = "Print the inscriptions of a reveal transaction or of a leaf script")]
struct Args {
    #[argh(switch, short = 's')]
    /// the hex is a leaf script, not a transaction
    script: bool,

    #[argh(positional)]
    /// hex encoded transaction or script
    pub hex: String,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    let data = hex::decode(args.hex.trim())?;

    let envelopes = if args.script {
        let script = ScriptBuf::from_bytes(data);
        println!("script: {script}");
        ParsedEnvelope::from_script(&script).into_iter().collect()
    } else {
        let tx: Transaction = bitcoin::consensus::deserialize(&data)?;
        println!("txid: {}", tx.txid());
        ParsedEnvelope::from_transaction(&tx)
    };

    if envelopes.is_empty() {
        println!("no inscription found");
    }
    for envelope in envelopes {
        println!(
            "input {}: {} ({} bytes)",
            envelope.input,
            envelope.content_type.as_deref().unwrap_or("no content type"),
            envelope.body.len()
        );
        println!("{}", String::from_utf8_lossy(&envelope.body));
    }

    Ok(())
}
