use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use nanovna_link::config::{self, CaptureOptions};
use nanovna_link::{
    invert_colors, snapshot, CommandProtocol, Connection, LineSettings, SerialConnection, Simulator,
};

// Fetches the analyzer's screen and stores it as an image.
fn main() -> Result<()> {
    config::init_tracing();

    let options = match CaptureOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(e) => {
            eprint!("{}", CaptureOptions::USAGE);
            return Err(e.into());
        }
    };
    if options.help {
        print!("{}", CaptureOptions::USAGE);
        return Ok(());
    }

    let target = match &options.out {
        Some(path) => path.clone(),
        None => {
            let name = config::default_capture_name(&chrono::Local::now());
            println!("{}", name);
            PathBuf::from(name)
        }
    };

    if options.simulate {
        let conn = Connection::new(Simulator::new(options.geometry), "simulator");
        return capture(conn, &options, target);
    }
    let port = config::resolve_port(options.device.clone());
    let mut conn = SerialConnection::open(&port)?;
    conn.configure(&LineSettings::default())?;
    capture(conn, &options, target)
}

fn capture<P: Read + Write>(
    conn: Connection<P>,
    options: &CaptureOptions,
    target: PathBuf,
) -> Result<()> {
    let name = conn.name().to_string();
    let mut protocol = CommandProtocol::new(conn);

    let geometry = options.geometry;
    let frame = protocol
        .capture_screen(geometry)
        .with_context(|| format!("screen capture on {} failed", name))?;
    protocol.close();

    let mut rgb = frame.into_rgb()?;
    if options.invert {
        invert_colors(&mut rgb);
    }
    snapshot::write_image(
        &target,
        geometry.width as u32,
        geometry.height as u32,
        &rgb,
        options.title.as_deref(),
    )
    .with_context(|| format!("cannot store screenshot as {}", target.display()))?;
    Ok(())
}
