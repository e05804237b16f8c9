mod utils;

use argh::FromArgs;
use bitcoin::{FeeRate, Network};
use brc20_inscriber::{
    decode_signing_key, signer_address, Brc20, Inscriber, InscriberConfig, InscriptionPayload,
    InscriptionRequest, OrdError, RevealMode,
};
use log::info;
use utils::EsploraClient;

#[derive(FromArgs, Debug)]
#[argh(description = "Inscribe BRC-20 operations")]
struct Args {
    #[argh(option)]
    /// BRC-20 operation (`mint`, `transfer` or `deploy`)
    op: String,

    #[argh(option)]
    /// ticker (e.g. `ordi`)
    tick: String,

    #[argh(option)]
    /// amount; max supply for `deploy`
    amt: String,

    #[argh(option, default = "1")]
    /// number of times to repeat the operation
    repeat: usize,

    #[argh(option, default = "10")]
    /// commit fee rate, in sat/vB
    fee: u64,

    #[argh(option)]
    /// reveal fee rate, in sat/vB; the commit fee rate if unset
    reveal_fee: Option<u64>,

    #[argh(switch)]
    /// reveal every inscription in a single transaction
    single_reveal: bool,

    #[argh(switch)]
    /// only compute the fees, don't send any transaction
    simulate: bool,

    #[argh(option, default = "Network::Signet")]
    /// network (bitcoin, testnet, signet)
    network: Network,

    #[argh(option, short = 'p')]
    /// WIF private key; read from the `PK` environment variable if unset
    private_key: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args: Args = argh::from_env();

    let wif = match args.private_key {
        Some(wif) => wif,
        None => std::env::var("PK")
            .map_err(|_| anyhow::anyhow!("no private key given and PK is not set"))?,
    };
    let private_key = decode_signing_key(&wif, args.network)?;
    let address = signer_address(&private_key, args.network);
    println!("network: {}", args.network);
    println!("your address: {address}");

    let brc20 = Brc20::from_parts(&args.op, &args.tick, &args.amt)?;
    println!("inscription: {}", brc20.encode()?);
    println!("repeat: {}", args.repeat);

    let commit_fee_rate = FeeRate::from_sat_per_vb(args.fee)
        .ok_or_else(|| anyhow::anyhow!("fee rate {} is out of range", args.fee))?;
    let reveal_fee = args.reveal_fee.unwrap_or(args.fee);
    let reveal_fee_rate = FeeRate::from_sat_per_vb(reveal_fee)
        .ok_or_else(|| anyhow::anyhow!("fee rate {reveal_fee} is out of range"))?;
    let reveal_mode = if args.single_reveal {
        RevealMode::Aggregated
    } else {
        RevealMode::Individual
    };

    let inscriber = Inscriber::new(
        EsploraClient::new(args.network)?,
        InscriberConfig::new(args.network),
    );
    let funding = inscriber.spendable_funding(&private_key).await?;
    info!("{} spendable outputs", funding.len());

    let request = InscriptionRequest::new(
        funding,
        InscriptionPayload::from_inscription(&brc20, address.clone())?.repeat(args.repeat),
        commit_fee_rate,
    )
    .with_reveal_fee_rate(reveal_fee_rate)
    .with_reveal_mode(reveal_mode);

    let signed = inscriber.prepare(&request)?;
    let summary = signed.summary();
    println!("your balance: {}", summary.funding_total);

    if args.simulate {
        let fee = signed.total_fee();
        println!("fee to spend: {fee}");
        println!("network fee : {}", summary.network_fee);
        println!("postage     : {}", summary.postage);
        println!("balance after inscription: {}", summary.funding_total - fee);
        return Ok(());
    }

    match inscriber.inscribe(&request).await {
        Ok(outcome) => {
            println!("commit txid      : {}", outcome.commit_txid);
            for txid in &outcome.reveal_txids {
                println!("inscription txid : {txid}");
            }
            println!("fee spent        : {}", outcome.total_fee);
            println!(
                "view on mempool  : {}",
                explorer_link(args.network, &outcome.commit_txid.to_string())
            );
            Ok(())
        }
        Err(OrdError::PartialBroadcast(partial)) => {
            println!("commit txid      : {}", partial.commit_txid);
            for (index, txid) in &partial.succeeded {
                println!("inscription {index} txid: {txid}");
            }
            for (index, reason) in &partial.failed {
                println!("inscription {index} failed: {reason}");
            }
            Err(OrdError::PartialBroadcast(partial).into())
        }
        Err(err) => Err(err.into()),
    }
}

fn explorer_link(network: Network, txid: &str) -> String {
    match network {
        Network::Bitcoin => format!("https://mempool.space/tx/{txid}"),
        network => format!("https://mempool.space/{network}/tx/{txid}"),
    }
}
