//! Offline conversion of a local file, without the chat platform.

use std::path::{Path, PathBuf};

use crate::cli::{Cli, KindArg};
use crate::config::MediaConfig;
use crate::media::{ConversionResult, Converters, MediaKind, TempStore};

/// Where a file result lands when `--output` is not given.
fn default_output(input: &Path, kind: MediaKind) -> PathBuf {
    let ext = match kind {
        MediaKind::Image => "pdf",
        MediaKind::Video => "mp3",
        MediaKind::Voice => "txt",
    };
    input.with_extension(ext)
}

/// Convert `input` as `kind`, writing a file result to `output` or printing text.
pub async fn run_convert_command(
    cli: &Cli,
    kind: KindArg,
    input: &Path,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let media = MediaConfig::from_cli(cli)?;
    let kind = MediaKind::from(kind);

    let size = tokio::fs::metadata(input)
        .await
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", input.display(), e))?
        .len();
    let max = media.limits.max_attachment_bytes;
    if size > max {
        anyhow::bail!("{} is {} bytes, the limit is {}", input.display(), size, max);
    }

    let temp = TempStore::new(&media.temp_dir);
    let converters = Converters::from_config(&media, temp);

    let converter = converters.select(kind);
    let convert = converter.convert(input);
    let result = tokio::time::timeout(media.limits.job_timeout, convert)
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "conversion did not finish within {}s",
                media.limits.job_timeout.as_secs()
            )
        })?;

    match result {
        ConversionResult::Document(file) | ConversionResult::Audio(file) => {
            let dest = output
                .map(Path::to_path_buf)
                .unwrap_or_else(|| default_output(input, kind));
            tokio::fs::copy(file.path(), &dest).await?;
            println!("Wrote {}", dest.display());
        }
        ConversionResult::Text(text) => match output {
            Some(dest) => {
                tokio::fs::write(dest, text.as_bytes()).await?;
                println!("Wrote {}", dest.display());
            }
            None => println!("{}", text),
        },
        ConversionResult::Failure(error_kind, detail) => {
            anyhow::bail!("{} ({}): {}", error_kind.user_message(), error_kind, detail);
        }
    }

    Ok(())
}
