//! OpenAPI document for the REST API.

use utoipa::OpenApi;

use crate::api::dto::{
    CaptureChargeRequest, CaptureResponse, CreateIntentRequest, IntentResponse, MetadataResponse,
    PaymentMethodsResponse, PricingResponse, PutMetadataRequest, SettleResponse,
    SetupIntentResponse,
};
use crate::api::handlers::{checkout, metadata, pricing, system};
use crate::domain::{ChargeRecord, MetadataDocument, UserMetadata};
use crate::error::{ErrorBody, ErrorResponse};
use crate::processor::{CardDetails, IntentStatus, PaymentMethod};

/// OpenAPI document, served by Swagger UI when the
/// `swagger-ui` feature is enabled.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "locksmith-gateway",
        description = "Key metadata and card checkout for on-chain membership locks."
    ),
    paths(
        system::health_handler,
        metadata::put_metadata,
        metadata::get_metadata,
        pricing::get_pricing,
        checkout::create_intent,
        checkout::capture_charge,
        checkout::settle_payment,
        checkout::create_setup_intent,
        checkout::list_payment_methods,
    ),
    components(schemas(
        ErrorResponse,
        ErrorBody,
        system::HealthResponse,
        PutMetadataRequest,
        MetadataResponse,
        MetadataDocument,
        UserMetadata,
        PricingResponse,
        CreateIntentRequest,
        IntentResponse,
        CaptureChargeRequest,
        CaptureResponse,
        SettleResponse,
        SetupIntentResponse,
        PaymentMethodsResponse,
        PaymentMethod,
        CardDetails,
        IntentStatus,
        ChargeRecord,
    )),
    tags(
        (name = "System", description = "Liveness"),
        (name = "Metadata", description = "Protected and public key metadata"),
        (name = "Pricing", description = "Card purchase price breakdowns"),
        (name = "Purchase", description = "Card checkout through connected accounts"),
    )
)]
pub struct ApiDoc;
