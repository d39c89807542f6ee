use env_logger::{Builder, Env, Target};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

pub const LOG_FILE_NAME: &str = "email_api.log";

/// Writes every line to stderr and to the log file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Install the global logger. `RUST_LOG` overrides the default `info` filter.
///
/// With `log_dir`, output is also appended to `<log_dir>/email_api.log`.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_logging(log_dir: Option<&Path>) -> io::Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.target(),
            record.level(),
            record.args()
        )
    });

    if let Some(dir) = log_dir {
        fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE_NAME))?;
        builder.target(Target::Pipe(Box::new(Tee { file })));
    }

    if builder.try_init().is_err() {
        log::debug!("Logger already initialised");
    }
    Ok(())
}
