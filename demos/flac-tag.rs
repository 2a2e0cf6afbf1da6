use flac_meta::stream::{Save, read_file, update};

/// Roughly corresponds to the reference implementation's:
///
/// "metaflac --set-tag=FIELD <file.flac>"
///
/// Though without a full argument parser,
/// it operates on only a single FLAC file at time.
/// Also, when no tags are indicated, it simply
/// displays the file's existing tags.
/// A leading "-v" logs each metadata block as it's handled.

fn main() {
    let mut args = std::env::args().skip(1).collect::<Vec<_>>();

    let verbose = args.first().is_some_and(|a| a == "-v");
    if verbose {
        args.remove(0);
    }

    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    match args.as_slice() {
        [flac] => match read_file(flac) {
            Ok(stream) => {
                if let Some(comment) = stream.vorbis_comment {
                    for tag in comment.tags() {
                        println!("{tag}");
                    }
                }
            }
            Err(err) => eprintln!("* Error: {err}"),
        },
        [tags @ .., flac] if tags.iter().all(|t| t.contains('=')) => {
            match update(flac, |stream| {
                stream.update_comment(|vorbis_comment| {
                    for tag in tags {
                        if let Some((field, value)) = tag.split_once('=') {
                            vorbis_comment.set(field, value);
                        }
                    }
                });
                Ok::<_, flac_meta::Error>(Save::Commit)
            }) {
                Ok(_) => println!("* {flac}: Updated"),
                Err(err) => println!("* Error: {flac} - {err}"),
            }
        }
        _ => eprintln!("* Usage: [-v] \"TITLE=Track Title\" \"ALBUM=Album Title\" <file.flac>"),
    }
}
