use serde::Serialize;
use tera::{Context, Tera};

const CAMPAIGN_INSTRUCTION: &str = r#"You are a Marketing Campaign Manager Agent.

**Customer Context:**
Customer ID: {{ customer_id }}
Global Strategy: {{ global_instruction }}

**Current Focus:**
Campaign ID: {{ campaign_id }}
Campaign Specific Rules: {{ campaign_instruction }}

**Task:**
1. Analyze the current situation for Campaign {{ campaign_id }}.
2. Check whether any external factors named in the instructions are relevant, using
   fetch_external_signal when it is offered.
3. Check the campaign's current performance/status using Google Ads tools.
4. Decide on an action (Pause, Enable, Change Bid, Change Location, or No Action).
5. Execute the action if necessary.
6. Provide a concise summary of your analysis and actions.
"#;

pub const DEFAULT_CAMPAIGN_INSTRUCTION: &str = "No specific instruction.";

#[derive(Clone, Debug, Serialize)]
pub struct CampaignBrief<'a> {
    pub customer_id: &'a str,
    pub global_instruction: &'a str,
    pub campaign_id: &'a str,
    pub campaign_instruction: &'a str,
}

pub fn render_campaign_instruction(brief: &CampaignBrief<'_>) -> Result<String, tera::Error> {
    let context = Context::from_serialize(brief)?;
    Tera::one_off(CAMPAIGN_INSTRUCTION, &context, false)
}

pub fn campaign_request(campaign_id: &str) -> String {
    format!(
        "Proceed with the analysis and management of Campaign {campaign_id} \
         based on your instructions."
    )
}
