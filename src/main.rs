use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use serde::{Deserialize, Serialize};
use tip_ledger::{
    format_ether, parse_ether, AccountBook, Amount, CallContext, LedgerSnapshot, Principal,
    TipLedger, Timestamp,
};

//==================== CLI ====================//

#[derive(Parser, Debug)]
#[command(name = "drink", version)]
#[command(about = "Buy Me A Drink: tip a ledger with a note, let its owner withdraw", long_about = None)]
struct Cli {
    /// World state file (ledger + external balances)
    #[arg(long, env = "DRINK_STATE", default_value = "drink-state.json", global = true)]
    state: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a fresh ledger owned by --owner
    Deploy {
        #[arg(long)]
        owner: Principal,

        /// Address of the ledger's custodial account
        #[arg(long, default_value = "buy-me-a-drink")]
        address: Principal,

        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Credit an external account (local faucet)
    Fund {
        #[arg(long)]
        account: Principal,

        #[arg(long, value_parser = parse_ether)]
        ether: Amount,
    },
    /// Tip the ledger and leave a note
    BuyDrink {
        #[arg(long)]
        from: Principal,

        #[arg(long)]
        name: String,

        #[arg(long)]
        message: String,

        #[arg(long, value_parser = parse_ether)]
        ether: Amount,

        /// Defaults to the current UNIX time in seconds
        #[arg(long)]
        timestamp: Option<Timestamp>,
    },
    /// Drain the custodial balance to the owner
    Withdraw {
        #[arg(long)]
        caller: Principal,

        #[arg(long)]
        timestamp: Option<Timestamp>,
    },
    /// Print every note in the order it was left
    Notes {
        #[arg(long)]
        json: bool,
    },
    /// Print the ledger balance, or an external account's balance
    Balance {
        #[arg(long)]
        account: Option<Principal>,
    },
    /// Print the balances of several addresses
    Balances {
        #[arg(required = true)]
        accounts: Vec<Principal>,
    },
}

//==================== state file ====================//

const STATE_VERSION: u8 = 1;

#[derive(Serialize, Deserialize)]
struct WorldFile {
    version: u8,
    ledger: LedgerSnapshot,
    accounts: AccountBook,
}

struct World {
    ledger: TipLedger,
    accounts: AccountBook,
}

impl World {
    fn deploy(owner: Principal, address: Principal) -> Result<Self> {
        if owner == address {
            bail!("the owner cannot be the ledger's own address");
        }
        Ok(Self {
            ledger: TipLedger::new(owner),
            accounts: AccountBook::new(address),
        })
    }

    fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| {
            format!("read state file {} (run `drink deploy` first)", path.display())
        })?;
        let file: WorldFile = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse state file {}", path.display()))?;
        if file.version != STATE_VERSION {
            bail!(
                "unsupported state file version {} (expected {STATE_VERSION})",
                file.version
            );
        }
        let ledger = TipLedger::restore(file.ledger).context("restore ledger")?;
        let world = Self {
            ledger,
            accounts: file.accounts,
        };
        world.check_custody()?;
        Ok(world)
    }

    /// The custodial account must hold exactly what the ledger says it holds.
    fn check_custody(&self) -> Result<()> {
        let custody = self.accounts.balance_of(self.accounts.custody());
        if custody != self.ledger.balance() {
            bail!(
                "custody account holds {} wei but the ledger balance is {} wei",
                custody,
                self.ledger.balance()
            );
        }
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.check_custody().context("refusing to save")?;
        let file = WorldFile {
            version: STATE_VERSION,
            ledger: self.ledger.snapshot(),
            accounts: self.accounts.clone(),
        };
        let json = serde_json::to_vec_pretty(&file).context("encode state")?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
        info!(
            "saved {} (state root {})",
            path.display(),
            hex::encode(file.ledger.state_root)
        );
        Ok(())
    }
}

fn now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

//==================== commands ====================//

fn deploy_cmd(state: &Path, owner: Principal, address: Principal, force: bool) -> Result<()> {
    if state.exists() && !force {
        bail!(
            "{} already exists; pass --force to replace it",
            state.display()
        );
    }
    let world = World::deploy(owner, address)?;
    world.save(state)?;
    println!(
        "BuyMeADrink deployed to: {} (owner {})",
        world.accounts.custody(),
        world.ledger.owner()
    );
    Ok(())
}

fn fund_cmd(state: &Path, account: Principal, ether: Amount) -> Result<()> {
    let mut world = World::load(state)?;
    if &account == world.accounts.custody() {
        bail!("the ledger's custodial account can only be funded by buying drinks");
    }
    world.accounts.credit(&account, ether)?;
    world.save(state)?;
    println!(
        "Funded {account} with {} (balance {})",
        format_ether(ether),
        format_ether(world.accounts.balance_of(&account))
    );
    Ok(())
}

fn buy_drink_cmd(
    state: &Path,
    from: Principal,
    name: String,
    message: String,
    ether: Amount,
    timestamp: Option<Timestamp>,
) -> Result<()> {
    let mut world = World::load(state)?;
    if &from == world.accounts.custody() {
        bail!("the ledger's custodial account cannot tip itself");
    }
    let ctx = CallContext::new(from, timestamp.unwrap_or_else(now)).with_value(ether);
    world
        .ledger
        .buy_drink(&ctx, name, message, &mut world.accounts)
        .context("buyDrink")?;
    world.save(state)?;
    println!(
        "{} bought a drink for {} (ledger balance {})",
        ctx.caller,
        format_ether(ether),
        format_ether(world.ledger.balance())
    );
    Ok(())
}

fn withdraw_cmd(state: &Path, caller: Principal, timestamp: Option<Timestamp>) -> Result<()> {
    let mut world = World::load(state)?;
    let ctx = CallContext::new(caller, timestamp.unwrap_or_else(now));
    let paid = world
        .ledger
        .withdraw_funds(&ctx, &mut world.accounts)
        .context("withdrawFunds")?;
    world.save(state)?;
    println!("Withdrew {} to {}", format_ether(paid), world.ledger.owner());
    Ok(())
}

fn notes_cmd(state: &Path, json: bool) -> Result<()> {
    let world = World::load(state)?;
    if json {
        println!("{}", serde_json::to_string_pretty(world.ledger.notes().as_slice())?);
        return Ok(());
    }
    for note in world.ledger.notes() {
        println!(
            "At {}, {} ({}) said: \"{}\"",
            note.timestamp(),
            note.display_name(),
            note.sender(),
            note.message()
        );
    }
    Ok(())
}

fn balance_cmd(state: &Path, account: Option<Principal>) -> Result<()> {
    let world = World::load(state)?;
    let amount = match &account {
        Some(account) => world.accounts.balance_of(account),
        None => world.ledger.balance(),
    };
    println!("{} ({} wei)", format_ether(amount), amount);
    Ok(())
}

fn balances_cmd(state: &Path, accounts: &[Principal]) -> Result<()> {
    let world = World::load(state)?;
    for (idx, account) in accounts.iter().enumerate() {
        println!(
            "Address {idx} balance:  {}",
            format_ether(world.accounts.balance_of(account))
        );
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let state = cli.state.as_path();
    match cli.command {
        Commands::Deploy {
            owner,
            address,
            force,
        } => deploy_cmd(state, owner, address, force),
        Commands::Fund { account, ether } => fund_cmd(state, account, ether),
        Commands::BuyDrink {
            from,
            name,
            message,
            ether,
            timestamp,
        } => buy_drink_cmd(state, from, name, message, ether, timestamp),
        Commands::Withdraw { caller, timestamp } => withdraw_cmd(state, caller, timestamp),
        Commands::Notes { json } => notes_cmd(state, json),
        Commands::Balance { account } => balance_cmd(state, account),
        Commands::Balances { accounts } => balances_cmd(state, &accounts),
    }
}

fn init_logger(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tip_ledger::{LedgerError, WEI_PER_ETHER};

    fn drink(state: &Path, args: &[&str]) -> Result<()> {
        let head = ["drink", "--state", state.to_str().unwrap()];
        let argv = head.iter().chain(args.iter()).copied();
        run(Cli::try_parse_from(argv)?)
    }

    fn p(id: &str) -> Principal {
        Principal::new(id).unwrap()
    }

    #[test]
    fn demo_sequence_through_the_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("world").join("state.json");

        drink(&state, &["deploy", "--owner", "owner"]).unwrap();
        for signer in ["owner", "b1", "b2"] {
            drink(&state, &["fund", "--account", signer, "--ether", "10000"]).unwrap();
        }
        drink(
            &state,
            &[
                "buy-drink", "--from", "b1", "--name", "Trisha", "--message",
                "You're the best!", "--ether", "1", "--timestamp", "10",
            ],
        )
        .unwrap();
        drink(
            &state,
            &[
                "buy-drink", "--from", "b2", "--name", "Samuel", "--message",
                "Amazing teacher", "--ether", "1", "--timestamp", "11",
            ],
        )
        .unwrap();

        let world = World::load(&state).unwrap();
        assert_eq!(world.ledger.balance(), 2 * WEI_PER_ETHER);
        assert_eq!(world.ledger.notes().len(), 2);
        assert_eq!(world.ledger.notes().get(1).unwrap().display_name(), "Samuel");

        drink(&state, &["withdraw", "--caller", "owner"]).unwrap();
        let world = World::load(&state).unwrap();
        assert_eq!(world.ledger.balance(), 0);
        assert_eq!(world.accounts.balance_of(&p("owner")), 10_002 * WEI_PER_ETHER);
        assert_eq!(world.ledger.notes().len(), 2);

        let err = drink(&state, &["withdraw", "--caller", "b1"]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<LedgerError>(),
            Some(&LedgerError::NotAuthorized { caller: p("b1") })
        );

        drink(&state, &["notes"]).unwrap();
        drink(&state, &["balances", "owner", "b1", "buy-me-a-drink"]).unwrap();
    }

    #[test]
    fn zero_ether_tip_is_refused_and_state_kept() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        drink(&state, &["deploy", "--owner", "owner"]).unwrap();
        drink(&state, &["fund", "--account", "b1", "--ether", "1"]).unwrap();

        let err = drink(
            &state,
            &["buy-drink", "--from", "b1", "--name", "n", "--message", "m", "--ether", "0"],
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<LedgerError>(),
            Some(&LedgerError::InsufficientPayment)
        );
        let world = World::load(&state).unwrap();
        assert!(world.ledger.notes().is_empty());
        assert_eq!(world.accounts.balance_of(&p("b1")), WEI_PER_ETHER);
    }

    #[test]
    fn deploy_refuses_to_clobber_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        drink(&state, &["deploy", "--owner", "owner"]).unwrap();
        assert!(drink(&state, &["deploy", "--owner", "other"]).is_err());
        drink(&state, &["deploy", "--owner", "other", "--force"]).unwrap();
        assert_eq!(World::load(&state).unwrap().ledger.owner(), &p("other"));
    }

    #[test]
    fn owner_cannot_be_the_ledger_address() {
        assert!(World::deploy(p("same"), p("same")).is_err());
    }

    #[test]
    fn custody_cannot_be_funded_directly() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        drink(&state, &["deploy", "--owner", "owner", "--address", "jar"]).unwrap();
        assert!(drink(&state, &["fund", "--account", "jar", "--ether", "1"]).is_err());
    }

    #[test]
    fn custody_cannot_tip_itself() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        drink(&state, &["deploy", "--owner", "owner", "--address", "jar"]).unwrap();
        drink(&state, &["fund", "--account", "b1", "--ether", "1"]).unwrap();
        drink(
            &state,
            &["buy-drink", "--from", "b1", "--name", "n", "--message", "m", "--ether", "1"],
        )
        .unwrap();

        let err = drink(
            &state,
            &["buy-drink", "--from", "jar", "--name", "j", "--message", "self", "--ether", "1"],
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("cannot tip itself"));

        let world = World::load(&state).unwrap();
        assert_eq!(world.ledger.balance(), WEI_PER_ETHER);
        assert_eq!(world.ledger.notes().len(), 1);
        drink(&state, &["withdraw", "--caller", "owner"]).unwrap();
        assert_eq!(
            World::load(&state).unwrap().accounts.balance_of(&p("owner")),
            WEI_PER_ETHER
        );
    }

    #[test]
    fn diverged_custody_is_never_written() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        let mut world = World::deploy(p("owner"), p("jar")).unwrap();
        world.accounts.credit(&p("jar"), 5).unwrap();

        let err = world.save(&state).unwrap_err();
        assert!(format!("{err:#}").contains("custody account holds 5 wei"));
        assert!(!state.exists());
    }

    #[test]
    fn notes_json_lists_every_note() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        drink(&state, &["deploy", "--owner", "owner"]).unwrap();
        drink(&state, &["fund", "--account", "b1", "--ether", "2"]).unwrap();
        drink(
            &state,
            &["buy-drink", "--from", "b1", "--name", "n", "--message", "m", "--ether", "1.5"],
        )
        .unwrap();
        drink(&state, &["notes", "--json"]).unwrap();

        let world = World::load(&state).unwrap();
        let json = serde_json::to_value(world.ledger.notes().as_slice()).unwrap();
        assert_eq!(json[0]["display_name"], "n");
        assert_eq!(json[0]["amount"], serde_json::json!(3 * WEI_PER_ETHER / 2));
    }

    #[test]
    fn tampered_state_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("state.json");
        drink(&state, &["deploy", "--owner", "owner"]).unwrap();
        drink(&state, &["fund", "--account", "b1", "--ether", "1"]).unwrap();
        drink(
            &state,
            &["buy-drink", "--from", "b1", "--name", "n", "--message", "m", "--ether", "0.5"],
        )
        .unwrap();

        let mut json: serde_json::Value =
            serde_json::from_slice(&fs::read(&state).unwrap()).unwrap();
        json["ledger"]["notes"][0]["message"] = "edited".into();
        fs::write(&state, serde_json::to_vec(&json).unwrap()).unwrap();

        let err = World::load(&state).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<LedgerError>(),
            Some(LedgerError::CorruptSnapshot(_))
        ));
    }

    #[test]
    fn missing_state_file_points_at_deploy() {
        let dir = tempfile::tempdir().unwrap();
        let err = World::load(&dir.path().join("nope.json")).err().unwrap();
        assert!(format!("{err:#}").contains("drink deploy"));
    }

    #[test]
    fn invalid_ether_is_a_usage_error() {
        assert!(Cli::try_parse_from(["drink", "fund", "--account", "a", "--ether", "1.2.3"]).is_err());
        assert!(Cli::try_parse_from(["drink", "withdraw", "--caller", ""]).is_err());
    }
}
