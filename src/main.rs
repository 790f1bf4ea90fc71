use std::fs::File;
use std::io::{self, Read, Write};

use anyhow::{Context, Result};
use nanovna_link::config::{self, CommandOptions};
use nanovna_link::{
    CommandProtocol, Connection, Geometry, LineSettings, SerialConnection, Simulator,
};

// Sends one shell command to the analyzer and prints its response.
fn main() -> Result<()> {
    config::init_tracing();

    let options = match CommandOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprint!("{}", CommandOptions::USAGE);
            return Err(e.into());
        }
    };
    if options.help {
        print!("{}", CommandOptions::USAGE);
        return Ok(());
    }

    if options.simulate {
        let conn = Connection::new(Simulator::new(Geometry::NANOVNA), "simulator");
        return run(conn, &options);
    }
    let port = config::resolve_port(options.port.clone());
    let mut conn = SerialConnection::open(&port)?;
    conn.configure(&LineSettings::default())?;
    run(conn, &options)
}

fn run<P: Read + Write>(conn: Connection<P>, options: &CommandOptions) -> Result<()> {
    let name = conn.name().to_string();
    let mut protocol = CommandProtocol::new(conn);

    let result = match &options.out {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            protocol.execute(&options.command, &mut file)
        }
        None => protocol.execute(&options.command, &mut io::stdout().lock()),
    };
    result.with_context(|| format!("command '{}' failed on {}", options.command, name))?;

    protocol.close();
    Ok(())
}
