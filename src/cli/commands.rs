use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

/// Block production strategy for `startnode --mine`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineModeArg {
    Pow,
    Pos,
}

impl FromStr for MineModeArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pow" => Ok(MineModeArg::Pow),
            "pos" => Ok(MineModeArg::Pos),
            _ => Err(format!("Invalid mining mode: {s}. Valid options: pow, pos")),
        }
    }
}

impl std::fmt::Display for MineModeArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MineModeArg::Pow => write!(f, "pow"),
            MineModeArg::Pos => write!(f, "pos"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "nexis-chain")]
pub struct Opt {
    #[arg(
        long = "config",
        global = true,
        help = "TOML config file (NODE_* environment variables override it)"
    )]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createwallet", about = "Generate a new key pair")]
    Createwallet,
    #[command(name = "startnode", about = "Start a ledger node")]
    StartNode {
        #[arg(long = "addr", help = "Listen address, overrides the config")]
        addr: Option<String>,
        #[arg(long = "peer", help = "Peer to dial at startup (repeatable)")]
        peers: Vec<String>,
        #[arg(long = "mine", help = "Produce blocks: pow or pos")]
        mine: Option<MineModeArg>,
        #[arg(long = "wallet", help = "Hex private key of the producing wallet")]
        wallet: Option<String>,
        #[arg(long = "stake", help = "Stake this amount before producing (pos)")]
        stake: Option<f64>,
    },
    #[command(name = "send", about = "Sign a transfer and hand it to a node")]
    Send {
        #[arg(long = "wallet", help = "Hex private key of the sender")]
        wallet: String,
        #[arg(long = "to", help = "Recipient public key (hex) or address")]
        to: String,
        #[arg(long = "amount", help = "Amount to send")]
        amount: f64,
        #[arg(long = "fee", help = "Fee to pay; estimated when omitted")]
        fee: Option<f64>,
        #[arg(long = "node", help = "Node to submit to, defaults to the configured address")]
        node: Option<String>,
    },
    #[command(
        name = "getbalance",
        about = "Get the balance of an address from the local chain"
    )]
    GetBalance {
        #[arg(help = "The address")]
        address: String,
    },
    #[command(name = "printchain", about = "Print all blocks in the local chain")]
    Printchain,
    #[command(name = "validatechain", about = "Check every block of the local chain")]
    Validatechain,
    #[command(
        name = "estimatefee",
        about = "Suggest a fee for a transaction of the given size"
    )]
    EstimateFee {
        #[arg(long = "size", default_value_t = 256, help = "Transaction size in bytes")]
        size: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_startnode() {
        let opt = Opt::parse_from([
            "nexis-chain",
            "startnode",
            "--addr",
            "127.0.0.1:3001",
            "--peer",
            "127.0.0.1:2001",
            "--peer",
            "127.0.0.1:2002",
            "--mine",
            "POS",
        ]);
        match opt.command {
            Command::StartNode {
                addr, peers, mine, ..
            } => {
                assert_eq!(addr.as_deref(), Some("127.0.0.1:3001"));
                assert_eq!(peers.len(), 2);
                assert_eq!(mine, Some(MineModeArg::Pos));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_send_and_global_config() {
        let opt = Opt::parse_from([
            "nexis-chain",
            "send",
            "--wallet",
            "abcd",
            "--to",
            "ef01",
            "--amount",
            "2.5",
            "--config",
            "node.toml",
        ]);
        assert_eq!(opt.config, Some(PathBuf::from("node.toml")));
        match opt.command {
            Command::Send { amount, fee, .. } => {
                assert_eq!(amount, 2.5);
                assert_eq!(fee, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_invalid_mine_mode() {
        assert!("proof".parse::<MineModeArg>().is_err());
        assert!(Opt::try_parse_from(["nexis-chain", "startnode", "--mine", "x"]).is_err());
    }

    #[test]
    fn test_estimatefee_default_size() {
        let opt = Opt::parse_from(["nexis-chain", "estimatefee"]);
        assert!(matches!(opt.command, Command::EstimateFee { size: 256 }));
    }
}
