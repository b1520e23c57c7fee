//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use crate::api::dto::{
    BookSlotRequest, BookingItemDto, BulkBookingRequest, BulkBookingResponse,
    CheckoutSessionResponse, CreateCheckoutRequest, PaginationMeta, SlotListResponse,
    SlotTimeRequest, WebhookAck,
};
use crate::api::handlers::{bookings, checkout, slots, system, webhook};
use crate::domain::{Order, OrderStatus, PriceSnapshot, Slot, SlotStatus};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI specification, served by Swagger UI when the
/// `swagger-ui` feature is enabled.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "slotmarket",
        description = "Slot reservation, checkout and payment reconciliation for a two-sided marketplace."
    ),
    paths(
        slots::create_slot,
        slots::list_slots,
        slots::update_slot_time,
        slots::remove_slot,
        bookings::book_slot,
        bookings::cancel_reservation,
        bookings::book_slots,
        checkout::create_checkout_session,
        checkout::get_order_by_session,
        webhook::payment_webhook,
        system::health_handler,
    ),
    components(schemas(
        Slot,
        SlotStatus,
        PriceSnapshot,
        Order,
        OrderStatus,
        SlotTimeRequest,
        SlotListResponse,
        PaginationMeta,
        BookSlotRequest,
        BookingItemDto,
        BulkBookingRequest,
        BulkBookingResponse,
        CreateCheckoutRequest,
        CheckoutSessionResponse,
        WebhookAck,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Slots", description = "Provider calendars"),
        (name = "Bookings", description = "Slot reservations"),
        (name = "Checkout", description = "Payment sessions and orders"),
        (name = "Webhooks", description = "Payment gateway callbacks"),
        (name = "System", description = "Operational endpoints"),
    )
)]
pub struct ApiDoc;
