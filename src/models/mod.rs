pub mod contact;
pub mod contact_campaign;
pub mod drip_campaign;
pub mod user;

// Re-export common types
pub use contact::{Contact, ContactOrigin, CreateContactRequest, NewContact, UpdateContactRequest};
pub use contact_campaign::{
    CampaignSend, ContactCampaign, EnrollmentStatus, NewCampaignSend, NewContactCampaign,
};
pub use drip_campaign::{
    CampaignMessage, CampaignTrigger, CampaignWithMessages, CreateCampaignRequest, DripCampaign,
    MessageChannel, MessageRequest, NewCampaignMessage, NewDripCampaign, UpdateCampaignRequest,
};
pub use user::{LoginRequest, NewUser, RegisterRequest, UpdateProfileRequest, User};
