// Entry point for the node binary. Every subcommand except `startnode` and `send`
// works directly on this node's local database, so run those while the node is stopped
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use nexis_chain::cli::MineModeArg;
use nexis_chain::core::monetary::fee_model;
use nexis_chain::{
    send_transaction, Blockchain, Command, Config, KeyMaterial, Node, Opt, ProductionMode,
    Transaction, Wallet,
};
use std::process;

fn main() {
    // Info by default, RUST_LOG still wins
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(opt.config.as_deref())?;
    match opt.command {
        Command::Createwallet => {
            let wallet = Wallet::new()?;
            println!("Address:     {}", wallet.get_address());
            println!("Public key:  {}", wallet.get_public_key().encode());
            println!("Private key: {}", wallet.encode_private_key());
            println!("Keep the private key safe, it is not stored anywhere.");
        }
        Command::StartNode {
            addr,
            peers,
            mine,
            wallet,
            stake,
        } => {
            if let Some(addr) = addr {
                config.node_addr = addr;
            }
            config.peers.extend(peers);

            let producer = match (mine, wallet) {
                (Some(mode), Some(hex)) => Some((mode, Wallet::from_private_key_hex(&hex)?)),
                (Some(_), None) => return Err("--mine needs --wallet".into()),
                (None, _) => None,
            };

            let node = Node::open(config)?;
            let local_addr = node.start()?;
            info!(
                "Node {local_addr} started on {}, {:?}",
                node.get_config().db_path().display(),
                node.stats()?
            );

            match producer {
                Some((mode, wallet)) => {
                    let mode = match mode {
                        MineModeArg::Pow => ProductionMode::ProofOfWork,
                        MineModeArg::Pos => ProductionMode::ProofOfStake,
                    };
                    if let Some(amount) = stake {
                        if let Err(e) = node.stake(wallet.get_address(), amount) {
                            warn!("Could not stake {amount}: {e}");
                        }
                    }
                    node.run_producer(mode, &wallet)?;
                }
                None => {
                    // the accept loop runs on its own thread
                    loop {
                        std::thread::park();
                    }
                }
            }
        }
        Command::Send {
            wallet,
            to,
            amount,
            fee,
            node,
        } => {
            let wallet = Wallet::from_private_key_hex(&wallet)?;
            let fee = match fee {
                Some(fee) => fee,
                None => {
                    // price the transfer by its encoded size on an idle network
                    let draft = build_transfer(&wallet, &to, amount, 0.0)?;
                    let size = serde_json::to_vec(&draft)?.len();
                    fee_model::required_fee(size, 0.0, config.network.min_transaction_fee)
                }
            };
            let tx = build_transfer(&wallet, &to, amount, fee)?;
            let target = node.unwrap_or_else(|| config.node_addr.clone());
            send_transaction(&target, &tx)?;
            println!("Sent {amount} (fee {fee}) as transaction {}", tx.get_id());
        }
        Command::GetBalance { address } => {
            let blockchain = Blockchain::open(&config)?;
            println!("Balance of {address}: {}", blockchain.get_balance(&address));
        }
        Command::Printchain => {
            let blockchain = Blockchain::open(&config)?;
            for block in blockchain.get_chain() {
                println!("Block #{}", block.get_index());
                println!("  Hash:          {}", block.get_hash());
                println!("  Previous hash: {}", block.get_previous_hash());
                println!("  Timestamp:     {}", block.get_timestamp());
                println!("  Nonce:         {}", block.get_nonce());
                println!(
                    "  Reward / fees: {} / {}",
                    block.get_block_reward(),
                    block.get_total_fees()
                );
                if let Some(validator) = block.get_validator() {
                    println!("  Validator:     {validator}");
                }
                for tx in block.get_transactions() {
                    let from = if tx.is_coinbase() {
                        "coinbase"
                    } else {
                        tx.get_sender_address()
                    };
                    println!(
                        "  - {} : {from} -> {} value {} fee {}",
                        tx.get_id(),
                        tx.get_recipient_address(),
                        tx.get_value(),
                        tx.get_fee()
                    );
                }
                println!();
            }
            let stats = blockchain.stats();
            println!(
                "Height {}, supply {}, treasury {}",
                stats.height, stats.current_supply, stats.treasury_balance
            );
        }
        Command::Validatechain => {
            let blockchain = Blockchain::open(&config)?;
            blockchain.validate_chain(blockchain.get_chain())?;
            println!("Chain is valid ({} blocks)", blockchain.get_chain().len());
        }
        Command::EstimateFee { size } => {
            let blockchain = Blockchain::open(&config)?;
            println!(
                "Suggested fee for {size} bytes: {}",
                blockchain.estimate_fee(size)
            );
        }
    }
    Ok(())
}

// `to` is either a hex-encoded public key or a bare address
fn build_transfer(
    wallet: &Wallet,
    to: &str,
    amount: f64,
    fee: f64,
) -> Result<Transaction, Box<dyn std::error::Error>> {
    let tx = match KeyMaterial::decode_public(to) {
        Ok(recipient) => wallet.send_funds(&recipient, amount, fee)?,
        Err(_) => wallet.send_to_address(to, amount, fee)?,
    };
    Ok(tx)
}
