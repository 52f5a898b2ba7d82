use clap::Parser;
use std::path::PathBuf;

use crate::operations::OperationKind;
use crate::storage::StorageKind;

/// S3 Benchmark - load generator measuring object-storage latency and throughput
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Operation to benchmark
    #[clap(short = 'o', long, value_enum, default_value_t = OperationKind::Upload, help_heading = "Core Options")]
    pub operation: OperationKind,

    /// Number of concurrent workers
    #[clap(short = 't', long, default_value_t = crate::defaults::THREADS, help_heading = "Core Options")]
    pub threads: usize,

    /// Number of operations per worker
    #[clap(short = 'n', long = "n", default_value_t = crate::defaults::N, help_heading = "Core Options")]
    pub n: usize,

    /// Object size in bytes for upload operations
    #[clap(short = 's', long, default_value_t = crate::defaults::SIZE, help_heading = "Core Options")]
    pub size: u64,

    /// Target bucket
    #[clap(long, default_value = crate::defaults::BUCKET, help_heading = "Core Options")]
    pub bucket: String,

    /// Storage adapter to run against
    #[clap(long, value_enum, default_value_t = StorageKind::S3, help_heading = "Storage")]
    pub storage: StorageKind,

    /// S3 endpoint host (or full URL)
    #[clap(long, default_value = crate::defaults::ENDPOINT, help_heading = "Storage")]
    pub endpoint_url: String,

    /// Region used for request signing
    #[clap(long, default_value = crate::defaults::REGION, help_heading = "Storage")]
    pub region: String,

    /// Access key
    #[clap(long, env = "S3_ACCESS_KEY", hide_env_values = true, help_heading = "Storage")]
    pub access_key: Option<String>,

    /// Secret key
    #[clap(long, env = "S3_SECRET_KEY", hide_env_values = true, help_heading = "Storage")]
    pub secret_key: Option<String>,

    /// Use plain HTTP instead of HTTPS
    #[clap(long, default_value_t = false, help_heading = "Storage")]
    pub use_http: bool,

    /// Address buckets by path instead of virtual host
    #[clap(long, default_value_t = false, help_heading = "Storage")]
    pub path_style_access: bool,

    /// Close the connection after every request instead of reusing it
    #[clap(long, default_value_t = false, help_heading = "Storage")]
    pub no_keep_alive: bool,

    /// Key manifest written by create-key-file and read by random-read operations
    #[clap(long, default_value = crate::defaults::KEY_FILE, help_heading = "Storage")]
    pub key_file: PathBuf,

    /// KairosDB base URL; metrics are not reported when omitted
    #[clap(long, help_heading = "Reporting")]
    pub kairosdb_url: Option<String>,

    /// Value of the `source` metric tag
    #[clap(long, default_value = crate::defaults::SOURCE, help_heading = "Reporting")]
    pub source: String,

    /// Value of the `backend` metric tag
    #[clap(long, default_value = crate::defaults::BACKEND, help_heading = "Reporting")]
    pub backend: String,

    /// Metric name prefix
    #[clap(long, default_value = crate::defaults::NAMESPACE, help_heading = "Reporting")]
    pub namespace: String,

    /// Write results as JSON to this file
    #[clap(long, help_heading = "Output")]
    pub output_file: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[clap(short = 'v', long, action = clap::ArgAction::Count, help_heading = "Output")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[clap(short = 'q', long, default_value_t = false, conflicts_with = "verbose", help_heading = "Output")]
    pub quiet: bool,

    /// Also write logs to this file
    #[clap(long, help_heading = "Output")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["s3-benchmark"]).unwrap();
        assert_eq!(args.operation, OperationKind::Upload);
        assert_eq!(args.threads, 1);
        assert_eq!(args.n, 1000);
        assert_eq!(args.size, 65536);
        assert_eq!(args.bucket, "test-bucket");
        assert_eq!(args.storage, StorageKind::S3);
        assert_eq!(args.endpoint_url, "s3.amazonaws.com");
        assert_eq!(args.key_file, PathBuf::from("keys.txt"));
        assert_eq!(args.kairosdb_url, None);
        assert_eq!(args.source, "s3pt");
        assert_eq!(args.backend, "s3");
        assert_eq!(args.namespace, "core.engineering.s3");
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_full_command_line() {
        let args = Args::try_parse_from([
            "s3-benchmark",
            "-o",
            "random-read-metadata",
            "-t",
            "8",
            "-n",
            "250",
            "-s",
            "1024",
            "--bucket",
            "perf",
            "--storage",
            "memory",
            "--use-http",
            "--path-style-access",
            "--no-keep-alive",
            "--kairosdb-url",
            "http://kairos:8080",
            "-vv",
        ])
        .unwrap();

        assert_eq!(args.operation, OperationKind::RandomReadMetadata);
        assert_eq!(args.threads, 8);
        assert_eq!(args.n, 250);
        assert_eq!(args.size, 1024);
        assert_eq!(args.bucket, "perf");
        assert_eq!(args.storage, StorageKind::Memory);
        assert!(args.use_http);
        assert!(args.path_style_access);
        assert!(args.no_keep_alive);
        assert_eq!(args.kairosdb_url.as_deref(), Some("http://kairos:8080"));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_rejects_unknown_operation_and_quiet_with_verbose() {
        assert!(Args::try_parse_from(["s3-benchmark", "-o", "download"]).is_err());
        assert!(Args::try_parse_from(["s3-benchmark", "-q", "-v"]).is_err());
    }
}
