// src/client/main.rs

use std::env;
use std::process::ExitCode;

use fantastico::client::LicenseClient;
use fantastico::config::get_config;
use fantastico::errors::FantasticoResult;
use fantastico::fault::FaultResult;
use fantastico::logging::init_logging;
use fantastico::types::LicenseType;
use serde::Serialize;

const USAGE: &str = "usage: fantastico_client <command> [args]

commands:
  types                     list license types
  list [type]               list licensed IPs (type defaults to 0, all)
  list-detailed [type]      list licenses with details
  details <ip>              show one license
  add <ip> <type>           add a license
  edit <ip> <new-ip>        move a license to another IP
  deactivate <ip>           deactivate a license
  reactivate <ip>           reactivate a license
  delete <ip>               delete a license

credentials and endpoint come from fantastico.toml or FANTASTICO_* variables";

/// Command-line front end for the Fantastico license API.
///
/// Prints results as JSON on stdout and faults as
/// `{"faultCode": .., "faultMessage": ..}` on stderr.
#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    match run(&args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: &[String]) -> FantasticoResult<ExitCode> {
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        return Ok(ExitCode::from(2));
    };

    if command == "types" {
        return Ok(print(Ok(LicenseClient::list_types())));
    }

    let config = get_config()?;
    init_logging(&config.logging);
    let client = LicenseClient::from_config(config)?;

    let arg = |i: usize| args.get(i).map(String::as_str);
    let type_arg = |i: usize| -> Option<i64> {
        match arg(i) {
            None => Some(LicenseType::default().code()),
            Some(raw) => raw.parse().ok(),
        }
    };

    let code = match (command.as_str(), arg(1), arg(2)) {
        ("list", _, None) => match type_arg(1) {
            Some(t) => print(client.list_ips(t).await),
            None => usage(),
        },
        ("list-detailed", _, None) => match type_arg(1) {
            Some(t) => print(client.list_ips_detailed(t).await),
            None => usage(),
        },
        ("details", Some(ip), None) => print(client.get_details(ip).await),
        ("add", Some(ip), Some(t)) => match t.parse::<i64>() {
            Ok(t) => print(client.add_ip(ip, t).await),
            Err(_) => usage(),
        },
        ("edit", Some(ip), Some(new_ip)) => print(client.edit_ip(ip, new_ip).await),
        ("deactivate", Some(ip), None) => print(client.deactivate_ip(ip).await),
        ("reactivate", Some(ip), None) => print(client.reactivate_ip(ip).await),
        ("delete", Some(ip), None) => print(client.delete_ip(ip).await),
        _ => usage(),
    };

    Ok(code)
}

fn usage() -> ExitCode {
    eprintln!("{USAGE}");
    ExitCode::from(2)
}

fn print<T: Serialize>(result: FaultResult<T>) -> ExitCode {
    match result {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(json) => {
                println!("{json}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                ExitCode::from(2)
            }
        },
        Err(fault) => {
            let json = serde_json::to_string(&fault).unwrap_or_else(|_| fault.to_string());
            eprintln!("{json}");
            ExitCode::FAILURE
        }
    }
}
