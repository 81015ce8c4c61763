//! Service clients shared by every invocation.

use std::sync::Arc;

use aws_config::SdkConfig;
use aws_sdk_rekognition::Client as RekognitionClient;
use aws_sdk_s3::Client as S3Client;
use lambda_http::Error;
use lambda_http::tracing::info;

use crate::auth::{GoogleTokenVerifier, TokenVerifier};
use crate::config::{Config, StorageBackend};
use crate::models::{Order, Product};
use crate::payment::{PaymentGateway, StripeGateway};
use crate::recognition::{ImageAnalyzer, RekognitionAnalyzer};
use crate::storage::{JsonDocumentRepository, ObjectStore, Repository, S3ObjectStore, SheetsClient, SheetsRepository};

pub struct AppState {
    pub config: Config,
    pub products: Arc<dyn Repository<Product>>,
    pub orders: Arc<dyn Repository<Order>>,
    pub objects: Arc<dyn ObjectStore>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub payments: Arc<dyn PaymentGateway>,
    pub analyzer: Arc<dyn ImageAnalyzer>,
}

impl AppState {
    pub fn from_config(config: Config, sdk_config: &SdkConfig) -> Result<Self, Error> {
        let objects: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(S3Client::new(sdk_config), &config.bucket));

        let products: Arc<dyn Repository<Product>>;
        let orders: Arc<dyn Repository<Order>>;
        match config.storage_backend {
            StorageBackend::ObjectStore => {
                products = Arc::new(JsonDocumentRepository::<Product>::new(objects.clone(), "products"));
                orders = Arc::new(JsonDocumentRepository::<Order>::new(objects.clone(), "orders"));
            }
            StorageBackend::Spreadsheet => {
                let credentials = config.google_credentials.as_deref().unwrap_or_default();
                let client = Arc::new(SheetsClient::new(&config.sheets_id, credentials).map_err(|e| Error::from(e.to_string()))?);
                products = Arc::new(SheetsRepository::<Product>::new(client.clone()));
                orders = Arc::new(SheetsRepository::<Order>::new(client));
            }
        }
        info!(
            "Environment {}: {:?} storage, bucket {}",
            config.environment, config.storage_backend, config.bucket
        );

        Ok(Self {
            products,
            orders,
            objects,
            verifier: Arc::new(GoogleTokenVerifier::new(&config.google_client_id)),
            payments: Arc::new(StripeGateway::new(&config.stripe_secret_key)),
            analyzer: Arc::new(RekognitionAnalyzer::new(RekognitionClient::new(sdk_config))),
            config,
        })
    }
}
