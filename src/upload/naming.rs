use crate::types::LogicalInput;

const COMPRESSION_EXTENSIONS: &[&str] = &[".gz", ".gzip", ".bz", ".bz2", ".bzip"];

/// Name under which an input is registered with the control plane.
///
/// Pairs drop their `_R1_`-style read token. Recompressed uploads lose any
/// compression suffix, get a canonical `.fa`/`.fq` extension and end in `.gz`.
pub fn upload_filename(input: &LogicalInput, validate: bool) -> String {
    let base = input
        .primary_path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.primary_path().display().to_string());

    let (base, recompressed) = match input {
        LogicalInput::Single(_) => (base, validate),
        LogicalInput::Paired(..) => (strip_pair_token(&base), true),
    };
    if !recompressed {
        return base;
    }

    let (mut stem, mut ext) = split_extension(&base);
    if COMPRESSION_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        (stem, ext) = split_extension(stem);
    }
    let ext = match ext.to_ascii_lowercase().as_str() {
        ".fa" | ".fna" | ".fasta" => ".fa",
        ".fq" | ".fastq" => ".fq",
        _ => ext,
    };
    format!("{}{}.gz", stem, ext)
}

/// Remove every `[._][Rr][12][._]` token.
fn strip_pair_token(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes.len() - i >= 4 && is_pair_token(&bytes[i..i + 4]) {
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    // only ASCII bytes were removed
    String::from_utf8(out).unwrap_or_else(|_| name.to_string())
}

fn is_pair_token(window: &[u8]) -> bool {
    matches!(
        window,
        [b'.' | b'_', b'R' | b'r', b'1' | b'2', b'.' | b'_']
    )
}

/// Split at the last dot, ignoring a leading one
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i..]),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_recompressed_names() {
        let cases = [
            ("/data/reads.fastq", "reads.fq.gz"),
            ("/data/reads.fastq.gz", "reads.fq.gz"),
            ("reads.fna.bz2", "reads.fa.gz"),
            ("reads.fasta", "reads.fa.gz"),
            ("reads.FQ.GZ", "reads.fq.gz"),
            ("reads.txt", "reads.txt.gz"),
        ];
        for (path, expected) in cases {
            assert_eq!(upload_filename(&LogicalInput::single(path), true), expected);
        }
    }

    #[test]
    fn test_single_unvalidated_keeps_name() {
        let input = LogicalInput::single("/data/reads.fastq.bz2");
        assert_eq!(upload_filename(&input, false), "reads.fastq.bz2");
    }

    #[test]
    fn test_paired_strips_read_token() {
        let input = LogicalInput::paired("/x/sample_R1_001.fastq.gz", "/x/sample_R2_001.fastq.gz");
        assert_eq!(upload_filename(&input, true), "sample001.fq.gz");
        assert_eq!(upload_filename(&input, false), "sample001.fq.gz");

        let input = LogicalInput::paired("lane.r1.fq", "lane.r2.fq");
        assert_eq!(upload_filename(&input, true), "lanefq.gz");

        let input = LogicalInput::paired("a_1.fq", "a_2.fq");
        assert_eq!(upload_filename(&input, true), "a_1.fq.gz");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("a.b.c"), ("a.b", ".c"));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
        assert_eq!(split_extension("plain"), ("plain", ""));
    }
}
