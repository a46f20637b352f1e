use log::{error, warn};
use openssl::ssl::{SslConnector, SslMethod};
use postgres_openssl::MakeTlsConnector;
use tokio::time::Duration;
use tokio_postgres::{Client, NoTls};
use url::Url;

/// How often a database operation is attempted before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub wait_between_retries: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            wait_between_retries: Duration::from_secs(1),
        }
    }
}

/// TLS connector that verifies the server against the CA in `sslrootcert_path`
pub fn create_ssl_connector(sslrootcert_path: &str) -> Result<MakeTlsConnector, String> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|e| format!("SSL builder error: {}", e))?;

    builder
        .set_ca_file(sslrootcert_path)
        .map_err(|e| format!("Error loading CA cert: {}", e))?;

    Ok(MakeTlsConnector::new(builder.build()))
}

/// Split the `sslrootcert` parameter out of a connection URL
///
/// tokio-postgres rejects unknown query parameters, so the CA path is
/// removed from the URL and returned separately.
pub fn split_sslrootcert(database_url: &str) -> Result<(String, Option<String>), String> {
    let url = Url::parse(database_url).map_err(|e| format!("URL parse error: {}", e))?;

    let mut sslrootcert_path = None;
    let mut clean_params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert_path = Some(value.to_string());
        } else {
            clean_params.push((key.into_owned(), value.into_owned()));
        }
    }

    let mut clean_url = url.clone();
    clean_url.set_query(None);
    if !clean_params.is_empty() {
        let query = clean_params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        clean_url.set_query(Some(&query));
    }

    Ok((clean_url.to_string(), sslrootcert_path))
}

/// Open a client, with TLS when a CA certificate is configured
async fn connect(database_url: &str, sslrootcert_path: Option<&str>) -> Result<Client, String> {
    match sslrootcert_path {
        Some(path) => {
            let connector = create_ssl_connector(path)?;
            let (client, connection) = tokio_postgres::connect(database_url, connector)
                .await
                .map_err(|e| format!("Connection error: {}", e))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            Ok(client)
        }
        None => {
            let (client, connection) = tokio_postgres::connect(database_url, NoTls)
                .await
                .map_err(|e| format!("Connection error: {}", e))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            Ok(client)
        }
    }
}

/// Run `operation` on a fresh connection, retrying transient failures
///
/// Both connection and query errors are retried up to `policy.max_retries`
/// attempts. A malformed URL fails immediately.
pub async fn execute_with_retry<T, F, Fut>(
    database_url: &str,
    policy: &RetryPolicy,
    operation: F,
) -> Result<T, String>
where
    F: Fn(Client) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<T, tokio_postgres::Error>> + Send,
{
    let (clean_database_url, sslrootcert_path) = split_sslrootcert(database_url)?;

    for attempt in 0..policy.max_retries {
        match connect(&clean_database_url, sslrootcert_path.as_deref()).await {
            Ok(client) => match operation(client).await {
                Ok(value) => return Ok(value),
                Err(e) => error!("Attempt {}: query error: {}", attempt + 1, e),
            },
            Err(e) => error!("Attempt {}: {}", attempt + 1, e),
        }

        if attempt + 1 < policy.max_retries {
            warn!(
                "Retrying database operation in {:?}",
                policy.wait_between_retries
            );
            tokio::time::sleep(policy.wait_between_retries).await;
        }
    }

    Err("Max retries exceeded".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sslrootcert_is_split_from_other_parameters() {
        let (url, cert) = split_sslrootcert(
            "postgres://user:pw@db.example:5432/sigfox?sslmode=require&sslrootcert=/etc/ca.pem",
        )
        .unwrap();
        assert_eq!(url, "postgres://user:pw@db.example:5432/sigfox?sslmode=require");
        assert_eq!(cert.as_deref(), Some("/etc/ca.pem"));
    }

    #[test]
    fn url_without_parameters_is_unchanged() {
        let (url, cert) = split_sslrootcert("postgres://user@localhost/sigfox").unwrap();
        assert_eq!(url, "postgres://user@localhost/sigfox");
        assert_eq!(cert, None);
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(split_sslrootcert("not a url").is_err());
    }

    #[test]
    fn missing_ca_file_is_rejected() {
        match create_ssl_connector("/nonexistent/sigfox-ca.pem") {
            Ok(_) => panic!("connector built without a CA file"),
            Err(e) => assert!(e.contains("Error loading CA cert"), "{e}"),
        }
    }

    #[tokio::test]
    async fn zero_attempts_exceed_retries() {
        let policy = RetryPolicy {
            max_retries: 0,
            wait_between_retries: Duration::from_millis(0),
        };
        let result: Result<(), String> =
            execute_with_retry("postgres://localhost/sigfox", &policy, |_client| async {
                Ok::<(), tokio_postgres::Error>(())
            })
            .await;
        assert_eq!(result, Err("Max retries exceeded".to_string()));
    }
}
